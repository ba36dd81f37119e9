use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_diff::{EngineOptions, DEFAULT_PARALLELISM};
use strata_patch::DEFAULT_COMPRESSION_LEVEL;

use crate::error::{SdkError, SdkResult};

/// Engine settings, loadable from TOML. Missing keys take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory pairs compared concurrently during a diff.
    pub parallelism: usize,
    /// Zero modification times when building or ingesting snapshots.
    pub normalize_mtime: bool,
    /// zstd level for blobs embedded in patches.
    pub compression_level: i32,
    /// Default `tracing` filter for the binary.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            normalize_mtime: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            log_level: "info".into(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> SdkResult<()> {
        let levels = zstd::compression_level_range();
        if !levels.contains(&self.compression_level) {
            return Err(SdkError::Config(format!(
                "compression_level {} outside {}..={}",
                self.compression_level,
                levels.start(),
                levels.end()
            )));
        }
        if self.log_level.trim().is_empty() {
            return Err(SdkError::Config("log_level must not be empty".into()));
        }
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::default().with_parallelism(self.parallelism)
    }
}
