//! Artifact Inspector Library
//!
//! Reads joblib/pickle-serialized scikit-learn artifacts without a Python
//! runtime and reports what they hold: the runtime type of the persisted
//! ensemble model and the learned vectors of the feature scaler.

pub mod artifacts;
pub mod config;
pub mod inspect;
pub mod logging;
pub mod pickle;

pub use artifacts::{Artifact, ArtifactLoader, ModelArtifact, ScalerArtifact};
pub use config::InspectorConfig;
pub use inspect::{inspect_model, inspect_scaler, render};
pub use pickle::{PickleError, Value};
