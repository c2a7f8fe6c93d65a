//! The two inspections and their one-shot report rendering

use anyhow::Result;
use std::fmt::Display;
use std::path::Path;

use crate::artifacts::{ArtifactLoader, ModelArtifact, ScalerArtifact};

/// Load the persisted model at `path`
pub fn inspect_model<P: AsRef<Path>>(path: P) -> Result<ModelArtifact> {
    ArtifactLoader::new().load(path)
}

/// Load the persisted scaler at `path` and resolve both of its vectors
pub fn inspect_scaler<P: AsRef<Path>>(path: P) -> Result<ScalerArtifact> {
    ArtifactLoader::new().load(path)
}

/// Text printed to stdout: the report, or a single `Error:` line carrying
/// the whole cause chain.
pub fn render<T: Display>(result: &Result<T>) -> String {
    match result {
        Ok(report) => report.to_string(),
        Err(e) => format!("Error: {e:#}"),
    }
}
