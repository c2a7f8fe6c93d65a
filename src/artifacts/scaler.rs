//! Persisted feature scaler

use anyhow::Result;
use std::fmt;
use tracing::debug;

use crate::artifacts::python::{getattr, to_list};
use crate::artifacts::Artifact;
use crate::pickle::{repr, Value};

/// Learned standardization parameters, one entry per feature.
///
/// Elements are kept as decoded; nothing checks that they are numeric or
/// that both vectors have the same length.
#[derive(Debug, Clone)]
pub struct ScalerArtifact {
    pub mean: Vec<Value>,
    pub scale: Vec<Value>,
}

impl Artifact for ScalerArtifact {
    const KIND: &'static str = "scaler";

    fn from_value(value: Value) -> Result<Self> {
        let mean = to_list(getattr(&value, "mean_")?)?;
        let scale = to_list(getattr(&value, "scale_")?)?;
        debug!(mean = mean.len(), scale = scale.len(), "Scaler vectors resolved");
        Ok(Self { mean, scale })
    }
}

fn list(items: &[Value]) -> String {
    let items: Vec<String> = items.iter().map(repr).collect();
    format!("[{}]", items.join(", "))
}

impl fmt::Display for ScalerArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scaler Mean: {}", list(&self.mean))?;
        write!(f, "Scaler Scale: {}", list(&self.scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::render;
    use crate::pickle::{Global, Object};

    fn scaler(entries: Vec<(&str, Value)>) -> Value {
        let mut object = Object::new(Global::new("sklearn.preprocessing._data", "StandardScaler"), vec![]);
        object.state = Some(Value::Dict(
            entries
                .into_iter()
                .map(|(key, value)| (Value::Str(key.to_string()), value))
                .collect(),
        ));
        Value::Object(Box::new(object))
    }

    #[test]
    fn test_display() {
        let value = scaler(vec![
            ("mean_", Value::List(vec![Value::Float(0.1), Value::Float(0.2)])),
            ("scale_", Value::List(vec![Value::Float(1.0), Value::Float(2.0)])),
        ]);
        let artifact = ScalerArtifact::from_value(value).unwrap();
        assert_eq!(
            artifact.to_string(),
            "Scaler Mean: [0.1, 0.2]\nScaler Scale: [1.0, 2.0]"
        );
    }

    #[test]
    fn test_empty_and_mismatched_vectors() {
        let value = scaler(vec![
            ("mean_", Value::List(vec![])),
            ("scale_", Value::List(vec![Value::Int(3), Value::None])),
        ]);
        let artifact = ScalerArtifact::from_value(value).unwrap();
        assert_eq!(artifact.to_string(), "Scaler Mean: []\nScaler Scale: [3, None]");
    }

    #[test]
    fn test_missing_attribute() {
        let value = scaler(vec![("scale_", Value::List(vec![]))]);
        let err = ScalerArtifact::from_value(value).unwrap_err();
        assert_eq!(err.to_string(), "'StandardScaler' object has no attribute 'mean_'");
    }

    #[test]
    fn test_scale_failure_hides_mean() {
        let mean = Value::List(vec![Value::Float(0.1), Value::Float(0.2)]);

        let missing = ScalerArtifact::from_value(scaler(vec![("mean_", mean.clone())]));
        assert_eq!(
            render(&missing),
            "Error: 'StandardScaler' object has no attribute 'scale_'"
        );

        let scalar = ScalerArtifact::from_value(scaler(vec![
            ("mean_", mean),
            ("scale_", Value::Float(1.0)),
        ]));
        assert_eq!(render(&scalar), "Error: 'float' object is not iterable");
    }
}
