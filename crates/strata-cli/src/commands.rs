use std::fmt::Write as _;
use std::fs;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use strata_sdk::{ChangeKind, Changeset, EngineConfig, LineDiff, ObjectId, Record, SnapshotPair, Strata};

use crate::cli::*;
use crate::ingest::{export, ingest};

/// Engine configuration from `--config` (or defaults) and the global flags.
pub fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if cli.ignore_mtime {
        config.normalize_mtime = true;
    }
    Ok(config)
}

pub fn run_command(cli: Cli, config: EngineConfig) -> Result<()> {
    let strata = Strata::new(config);
    let format = cli.format;
    match cli.command {
        Command::Diff(args) => cmd_diff(&strata, args, format),
        Command::Patch(args) => cmd_patch(&strata, args),
        Command::Show(args) => cmd_show(&strata, args, format),
        Command::Apply(args) => cmd_apply(&strata, args),
        Command::Merge(args) => cmd_merge(&strata, args),
    }
}

fn cmd_diff(strata: &Strata, args: DiffArgs, format: OutputFormat) -> Result<()> {
    let old = ingest(strata, &args.old)?;
    let new = ingest(strata, &args.new)?;
    let cs = strata.diff(&new, &old)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cs)?),
        OutputFormat::Text => print!("{}", render_changeset(strata, &cs, &new, &old, args.patch)?),
    }
    Ok(())
}

fn cmd_patch(strata: &Strata, args: PatchArgs) -> Result<()> {
    let old = ingest(strata, &args.old)?;
    let new = ingest(strata, &args.new)?;
    let cs = strata.diff(&new, &old)?;
    let bytes = strata.as_patch(&cs, &new)?;
    fs::write(&args.output, &bytes)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    let summary = strata.from_patch(&bytes)?.summary();
    println!(
        "{} Wrote {} ({})",
        "✓".green().bold(),
        args.output.display().to_string().bold(),
        summary
    );
    Ok(())
}

fn cmd_show(strata: &Strata, args: ShowArgs, format: OutputFormat) -> Result<()> {
    let bytes = fs::read(&args.patch)
        .with_context(|| format!("failed to read {}", args.patch.display()))?;
    let patch = strata.from_patch(&bytes)?;
    match format {
        OutputFormat::Json => {
            let records: Vec<_> = patch.records().iter().map(record_json).collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Text => {
            for record in patch.records() {
                println!("{}", paint(record.tag(), &record.to_string()));
            }
            println!("{}", patch.summary().to_string().bold());
        }
    }
    Ok(())
}

fn cmd_apply(strata: &Strata, args: ApplyArgs) -> Result<()> {
    let base = ingest(strata, &args.base)?;
    let bytes = fs::read(&args.patch)
        .with_context(|| format!("failed to read {}", args.patch.display()))?;
    let patch = strata.from_patch(&bytes)?;
    if patch.is_empty() {
        println!("{}", "no changes to apply".yellow());
        export(strata, &base, &args.output)?;
        return Ok(());
    }
    let summary = strata.apply_patch(&base, patch)?;
    export(strata, &summary.root, &args.output)?;
    println!(
        "{} Applied to {}: {} removed, {} written",
        "✓".green().bold(),
        args.output.display().to_string().bold(),
        summary.removed,
        summary.written
    );
    if summary.absent > 0 {
        println!("  {} removals had nothing to remove", summary.absent.to_string().yellow());
    }
    Ok(())
}

fn cmd_merge(strata: &Strata, args: MergeArgs) -> Result<()> {
    let base = ingest(strata, &args.base)?;
    let ours = SnapshotPair::new(base, ingest(strata, &args.ours)?);
    let theirs = SnapshotPair::new(base, ingest(strata, &args.theirs)?);
    let merged = strata
        .merge(&ours, &theirs, args.strategy)
        .context("merge failed")?;
    export(strata, &merged.after, &args.output)?;
    let cs = strata.diff(&merged.after, &merged.before)?;
    println!(
        "{} Merged into {}: {}",
        "✓".green().bold(),
        args.output.display().to_string().bold(),
        cs
    );
    Ok(())
}

/// Changeset listing, optionally with line hunks for modified files.
fn render_changeset(
    strata: &Strata,
    cs: &Changeset,
    new: &ObjectId,
    old: &ObjectId,
    hunks: bool,
) -> Result<String> {
    let mut out = String::new();
    if cs.is_empty() {
        writeln!(out, "{}", "no changes".dimmed())?;
        return Ok(out);
    }
    for (path, kind) in cs.all_paths() {
        let tag = match kind {
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
            ChangeKind::Modified => '~',
        };
        writeln!(out, "{}", paint(tag, &format!("{tag} {path}")))?;
        if !hunks || kind != ChangeKind::Modified {
            continue;
        }
        match strata.line_diff(new, old, path)? {
            LineDiff::Binary { old_len, new_len } => {
                writeln!(out, "  {}", format!("binary file, {old_len} -> {new_len} bytes").dimmed())?;
            }
            LineDiff::Text { unified, .. } => {
                for line in unified.lines() {
                    let painted = match line.chars().next() {
                        Some('@') => line.cyan().to_string(),
                        Some('+') if !line.starts_with("+++") => line.green().to_string(),
                        Some('-') if !line.starts_with("---") => line.red().to_string(),
                        _ => line.to_string(),
                    };
                    writeln!(out, "  {painted}")?;
                }
            }
        }
    }
    writeln!(out, "{}", cs.to_string().bold())?;
    Ok(out)
}

fn paint(tag: char, line: &str) -> String {
    match tag {
        '+' => line.green().to_string(),
        '-' => line.red().to_string(),
        _ => line.yellow().to_string(),
    }
}

fn record_json(record: &Record) -> serde_json::Value {
    match record {
        Record::Remove { path } => json!({ "op": "remove", "path": path }),
        Record::Write { path, kind, entry } => json!({
            "op": if *kind == ChangeKind::Modified { "modify" } else { "add" },
            "path": path,
            "mode": entry.mode.to_string(),
            "size": entry.size,
        }),
    }
}
