//! Python attribute access and `list()` over decoded values

use anyhow::{bail, Result};

use crate::pickle::Value;

/// `getattr(value, name)` for instances restored by the default
/// `__setstate__`
pub fn getattr<'v>(value: &'v Value, name: &str) -> Result<&'v Value> {
    if let Value::Object(object) = value {
        if let Some(attr) = object.attr(name) {
            return Ok(attr);
        }
    }
    bail!(
        "'{}' object has no attribute '{}'",
        value.class_name(),
        name
    )
}

/// `list(value)`
pub fn to_list(value: &Value) -> Result<Vec<Value>> {
    let items = match value {
        Value::List(items) | Value::Tuple(items) | Value::Set(items) | Value::FrozenSet(items) => {
            items.clone()
        }
        Value::Dict(entries) => entries.iter().map(|(key, _)| key.clone()).collect(),
        Value::Str(text) => text.chars().map(|c| Value::Str(c.to_string())).collect(),
        Value::Bytes(bytes) | Value::ByteArray(bytes) => {
            bytes.iter().map(|b| Value::Int(i64::from(*b))).collect()
        }
        Value::Array(array) => match array.outer() {
            Some(items) => items,
            None => bail!("iteration over a 0-d array"),
        },
        // list and set subclasses
        Value::Object(object) if !object.items.is_empty() => object.items.clone(),
        // dict subclasses
        Value::Object(object) if !object.entries.is_empty() => {
            object.entries.iter().map(|(key, _)| key.clone()).collect()
        }
        other => bail!("'{}' object is not iterable", other.class_name()),
    };
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pickle::{DType, Global, NdArray, Object};

    fn scaler() -> Value {
        let mut object = Object::new(Global::new("sklearn.preprocessing._data", "StandardScaler"), vec![]);
        object.state = Some(Value::Dict(vec![(
            Value::Str("scale_".into()),
            Value::List(vec![Value::Float(1.0)]),
        )]));
        Value::Object(Box::new(object))
    }

    #[test]
    fn test_getattr() {
        let value = scaler();
        assert_eq!(
            getattr(&value, "scale_").unwrap(),
            &Value::List(vec![Value::Float(1.0)])
        );

        let err = getattr(&value, "mean_").unwrap_err();
        assert_eq!(err.to_string(), "'StandardScaler' object has no attribute 'mean_'");

        let err = getattr(&Value::Dict(vec![]), "mean_").unwrap_err();
        assert_eq!(err.to_string(), "'dict' object has no attribute 'mean_'");
    }

    #[test]
    fn test_to_list() {
        let dict = Value::Dict(vec![(Value::Str("a".into()), Value::Int(1))]);
        assert_eq!(to_list(&dict).unwrap(), vec![Value::Str("a".into())]);
        assert_eq!(
            to_list(&Value::Bytes(b"AB".to_vec())).unwrap(),
            vec![Value::Int(65), Value::Int(66)]
        );

        let err = to_list(&Value::Float(1.0)).unwrap_err();
        assert_eq!(err.to_string(), "'float' object is not iterable");
        let err = to_list(&scaler()).unwrap_err();
        assert_eq!(err.to_string(), "'StandardScaler' object is not iterable");
    }

    #[test]
    fn test_to_list_arrays() {
        let f8 = DType::parse("f8", None).unwrap();
        let raw: Vec<u8> = [0.5f64, 1.5].iter().flat_map(|v| v.to_le_bytes()).collect();
        let vector = NdArray::from_bytes(f8.clone(), vec![2], false, &raw).unwrap();
        assert_eq!(
            to_list(&Value::Array(vector)).unwrap(),
            vec![Value::Float(0.5), Value::Float(1.5)]
        );

        let zero_d = NdArray::from_bytes(f8, vec![], false, &raw[..8]).unwrap();
        let err = to_list(&Value::Array(zero_d)).unwrap_err();
        assert_eq!(err.to_string(), "iteration over a 0-d array");
    }
}
