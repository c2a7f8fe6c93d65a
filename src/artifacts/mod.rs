//! Typed views over deserialized artifacts

pub mod loader;
pub mod model;
pub mod python;
pub mod scaler;

pub use loader::ArtifactLoader;
pub use model::ModelArtifact;
pub use scaler::ScalerArtifact;

use anyhow::Result;

use crate::pickle::Value;

/// Shape expected from a deserialized artifact
pub trait Artifact: Sized {
    /// Name used in log lines
    const KIND: &'static str;

    /// Extract the artifact from the decoded object graph.
    fn from_value(value: Value) -> Result<Self>;
}
