//! Persisted predictive model

use anyhow::Result;
use std::fmt;

use crate::artifacts::Artifact;
use crate::pickle::Value;

/// Any deserialized object; only its type is reported
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub value: Value,
}

impl ModelArtifact {
    /// Fully qualified runtime type, e.g. `sklearn.ensemble._voting.VotingClassifier`
    pub fn type_name(&self) -> String {
        self.value.type_name()
    }
}

impl Artifact for ModelArtifact {
    const KIND: &'static str = "model";

    fn from_value(value: Value) -> Result<Self> {
        Ok(Self { value })
    }
}

impl fmt::Display for ModelArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model Type: <class '{}'>", self.type_name())
    }
}
