//! Safe decoder for Python pickle streams
//!
//! Produces a [`Value`] tree without executing anything the stream refers
//! to. numpy arrays (including joblib's inline payloads) are decoded into
//! [`NdArray`]s.

pub mod error;
pub mod machine;
pub mod numpy;
pub mod repr;
pub mod value;

pub use error::PickleError;
pub use machine::Unpickler;
pub use numpy::{DType, NdArray};
pub use repr::{float32_repr, float_repr, repr};
pub use value::{Global, Object, Value};

/// Decode a complete pickle stream.
pub fn loads(input: &[u8]) -> error::Result<Value> {
    Unpickler::new(input).load()
}
