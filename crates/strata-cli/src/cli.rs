use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use strata_sdk::MergeStrategy;

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Diff, patch and apply directory snapshots",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML engine configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Zero modification times while ingesting, so only content counts
    #[arg(long, global = true)]
    pub ignore_mtime: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what changed between two directories
    Diff(DiffArgs),
    /// Write the changes between two directories as a patch file
    Patch(PatchArgs),
    /// List the records of a patch file
    Show(ShowArgs),
    /// Apply a patch file to a directory, writing the result elsewhere
    Apply(ApplyArgs),
    /// Combine two sets of changes made from a common directory
    Merge(MergeArgs),
}

#[derive(Args)]
pub struct DiffArgs {
    pub old: PathBuf,
    pub new: PathBuf,
    /// Include line hunks for modified text files
    #[arg(short, long)]
    pub patch: bool,
}

#[derive(Args)]
pub struct PatchArgs {
    pub old: PathBuf,
    pub new: PathBuf,
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct ShowArgs {
    pub patch: PathBuf,
}

#[derive(Args)]
pub struct ApplyArgs {
    pub base: PathBuf,
    pub patch: PathBuf,
    /// Directory to create for the result; must not exist or be empty
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct MergeArgs {
    pub base: PathBuf,
    pub ours: PathBuf,
    pub theirs: PathBuf,
    #[arg(short, long)]
    pub output: PathBuf,
    /// fail-early, fail, leave-conflict-markers, prefer-ours or prefer-theirs
    #[arg(long, default_value = "fail")]
    pub strategy: MergeStrategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_diff() {
        let cli = Cli::try_parse_from(["strata", "diff", "a", "b", "--patch"]).unwrap();
        match cli.command {
            Command::Diff(args) => {
                assert_eq!(args.old, PathBuf::from("a"));
                assert_eq!(args.new, PathBuf::from("b"));
                assert!(args.patch);
            }
            _ => panic!("expected diff"),
        }
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn parse_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "strata", "diff", "a", "b", "--format", "json", "--ignore-mtime", "-v", "--config", "c.toml",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.ignore_mtime);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn parse_patch_requires_output() {
        assert!(Cli::try_parse_from(["strata", "patch", "a", "b"]).is_err());
        let cli = Cli::try_parse_from(["strata", "patch", "a", "b", "-o", "out.patch"]).unwrap();
        assert!(matches!(cli.command, Command::Patch(args) if args.output == PathBuf::from("out.patch")));
    }

    #[test]
    fn parse_apply_and_show() {
        let cli = Cli::try_parse_from(["strata", "apply", "base", "p.patch", "--output", "out"]).unwrap();
        assert!(matches!(cli.command, Command::Apply(args) if args.base == PathBuf::from("base")));
        let cli = Cli::try_parse_from(["strata", "show", "p.patch"]).unwrap();
        assert!(matches!(cli.command, Command::Show(_)));
    }

    #[test]
    fn parse_merge_strategy() {
        let cli = Cli::try_parse_from([
            "strata", "merge", "b", "o", "t", "-o", "out", "--strategy", "prefer-theirs",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Merge(args) if args.strategy == MergeStrategy::PreferTheirs));
        assert!(Cli::try_parse_from(["strata", "merge", "b", "o", "t", "-o", "x", "--strategy", "coin-flip"]).is_err());
    }

    #[test]
    fn unknown_format_rejected() {
        assert!(Cli::try_parse_from(["strata", "show", "p", "--format", "yaml"]).is_err());
    }
}
