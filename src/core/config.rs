//! TOML configuration: experiment policy and storage selection.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{AbError, Result};
use crate::ledger::records::DuplicateOutcomePolicy;
use crate::stats::{DEFAULT_CONFIDENCE_LEVEL, InferenceOptions, MIN_SAMPLE_SIZE};

/// Environment variable consulted by the CLI when `--config` is absent.
pub const CONFIG_ENV: &str = "ABE_CONFIG";

/// Full configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub experiment: ExperimentConfig,
    pub storage: StorageConfig,
}

/// Per-experiment routing and inference policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    pub id: String,
    /// Probability of routing a request to variant A.
    pub traffic_split: f64,
    pub confidence_level: f64,
    pub min_sample_size: usize,
    pub duplicate_outcomes: DuplicateOutcomePolicy,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            traffic_split: 0.5,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            min_sample_size: MIN_SAMPLE_SIZE,
            duplicate_outcomes: DuplicateOutcomePolicy::default(),
        }
    }
}

impl ExperimentConfig {
    #[must_use]
    pub const fn inference_options(&self) -> InferenceOptions {
        InferenceOptions {
            confidence_level: self.confidence_level,
            min_sample_size: self.min_sample_size,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageKind,
    /// Database file for the sqlite backend.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::Memory,
            path: PathBuf::from("abe.sqlite3"),
        }
    }
}

impl Config {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AbError::MissingConfig {
                    path: path.to_path_buf(),
                });
            }
            Err(err) => return Err(AbError::io(path, err)),
        };
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let experiment = &self.experiment;
        if experiment.id.trim().is_empty() {
            return Err(invalid("experiment.id must not be empty"));
        }
        if !(0.0..=1.0).contains(&experiment.traffic_split) {
            return Err(invalid(format!(
                "experiment.traffic_split must be within [0, 1], got {}",
                experiment.traffic_split
            )));
        }
        if !(experiment.confidence_level > 0.0 && experiment.confidence_level < 1.0) {
            return Err(invalid(format!(
                "experiment.confidence_level must be within (0, 1), got {}",
                experiment.confidence_level
            )));
        }
        if experiment.min_sample_size < MIN_SAMPLE_SIZE {
            return Err(invalid(format!(
                "experiment.min_sample_size must be at least {MIN_SAMPLE_SIZE}, got {}",
                experiment.min_sample_size
            )));
        }
        if self.storage.backend == StorageKind::Sqlite && self.storage.path.as_os_str().is_empty() {
            return Err(invalid("storage.path is required for the sqlite backend"));
        }
        Ok(())
    }
}

fn invalid(details: impl Into<String>) -> AbError {
    AbError::InvalidConfig {
        details: details.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml_str("").expect("defaults");
        assert_eq!(config, Config::default());
        assert_eq!(config.experiment.inference_options(), InferenceOptions::default());
    }

    #[test]
    fn full_file_parses() {
        let config = Config::from_toml_str(
            r#"
            [experiment]
            id = "checkout-button"
            traffic_split = 0.2
            confidence_level = 0.99
            min_sample_size = 30
            duplicate_outcomes = "reject"

            [storage]
            backend = "sqlite"
            path = "/var/lib/abe/ledger.sqlite3"
            "#,
        )
        .expect("valid config");
        assert_eq!(config.experiment.id, "checkout-button");
        assert!((config.experiment.traffic_split - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.experiment.duplicate_outcomes, DuplicateOutcomePolicy::Reject);
        assert_eq!(config.storage.backend, StorageKind::Sqlite);
        assert_eq!(config.experiment.inference_options().min_sample_size, 30);
    }

    #[test]
    fn out_of_range_values_are_invalid() {
        for raw in [
            "[experiment]\ntraffic_split = 1.5",
            "[experiment]\nconfidence_level = 1.0",
            "[experiment]\nmin_sample_size = 1",
            "[experiment]\nid = \"  \"",
        ] {
            let err = Config::from_toml_str(raw).expect_err(raw);
            assert_eq!(err.code(), "ABE-1001", "{raw}");
        }
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let err = Config::from_toml_str("[experiment]\nsplit = 0.5").expect_err("unknown key");
        assert_eq!(err.code(), "ABE-1003");
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load(&dir.path().join("absent.toml")).expect_err("missing");
        assert_eq!(err.code(), "ABE-1002");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("abe.toml");
        std::fs::write(&path, "[experiment]\nid = \"from-file\"\n").expect("write");
        let config = Config::load(&path).expect("load");
        assert_eq!(config.experiment.id, "from-file");
    }
}
