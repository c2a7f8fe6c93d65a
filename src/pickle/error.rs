//! Errors raised while decoding a pickle stream

use thiserror::Error;

/// Result type alias for the pickle machine
pub type Result<T> = std::result::Result<T, PickleError>;

/// Failure while decoding a pickle stream
#[derive(Debug, Error)]
pub enum PickleError {
    #[error("ran out of input")]
    Empty,

    #[error("pickle data was truncated")]
    Truncated,

    #[error("invalid load key, '\\x{opcode:02x}' at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("unsupported pickle protocol: {0}")]
    UnsupportedProtocol(u8),

    #[error("unsupported opcode {name} at offset {offset}")]
    UnsupportedOpcode { name: &'static str, offset: usize },

    #[error("unpickling stack underflow at offset {0}")]
    StackUnderflow(usize),

    #[error("could not find MARK at offset {0}")]
    MissingMark(usize),

    #[error("memo value not found at index {0}")]
    MissingMemo(usize),

    #[error("invalid {kind} literal {text:?}")]
    InvalidLiteral { kind: &'static str, text: String },

    #[error("{op} expected {expected}, found {found}")]
    UnexpectedValue {
        op: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("cannot decode numpy dtype {0:?}")]
    UnsupportedDtype(String),

    #[error("array payload of {expected} bytes does not match shape (got {actual})")]
    ArraySize { expected: usize, actual: usize },

    #[error("array is too big; `arr.size * arr.dtype.itemsize` is larger than the maximum possible size")]
    ArrayTooBig,

    #[error("recursive structure through memo index {0} cannot be materialized")]
    Recursive(usize),
}
