//! Configuration for the artifact inspectors

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Where the feature-extraction project keeps its persisted ensemble model
pub const MODEL_PATH: &str = "vcf_feature_extractor/models/ensemble_model.pkl";

/// Where the feature-extraction project keeps its fitted scaler
pub const SCALER_PATH: &str = "vcf_feature_extractor/models/ensemble_scaler.pkl";

/// Inspector configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct InspectorConfig {
    #[serde(default)]
    pub artifacts: ArtifactPaths,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Artifact locations, relative to the working directory
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ArtifactPaths {
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive (trace, debug, info, warn, error); `RUST_LOG` overrides it
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_model_path() -> PathBuf {
    PathBuf::from(MODEL_PATH)
}

fn default_scaler_path() -> PathBuf {
    PathBuf::from(SCALER_PATH)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl InspectorConfig {
    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            scaler_path: default_scaler_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InspectorConfig::default();
        assert_eq!(
            config.artifacts.model_path,
            Path::new("vcf_feature_extractor/models/ensemble_model.pkl")
        );
        assert_eq!(
            config.artifacts.scaler_path,
            Path::new("vcf_feature_extractor/models/ensemble_scaler.pkl")
        );
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inspector.toml");
        std::fs::write(
            &path,
            "[artifacts]\nmodel_path = \"/srv/models/ensemble_model.pkl\"\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = InspectorConfig::load_from_path(&path).unwrap();
        assert_eq!(
            config.artifacts.model_path,
            Path::new("/srv/models/ensemble_model.pkl")
        );
        assert_eq!(config.artifacts.scaler_path, Path::new(SCALER_PATH));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(InspectorConfig::load_from_path(dir.path().join("absent.toml")).is_err());
    }
}
