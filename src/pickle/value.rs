//! Materialized result of unpickling

use crate::pickle::numpy::NdArray;

/// Reference to a class or function by module and qualified name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Global {
    pub module: String,
    pub name: String,
}

impl Global {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Build from names found in a stream, applying the Python 2 module
    /// renames Python itself applies when loading old pickles.
    pub fn from_stream(module: &str, name: &str) -> Self {
        let module = match module {
            "__builtin__" => "builtins",
            "copy_reg" => "copyreg",
            other => other,
        };
        Self::new(module, name)
    }

    pub fn is(&self, module: &str, name: &str) -> bool {
        self.module == module && self.name == name
    }

    /// Dotted path as Python prints it; builtins drop their module.
    pub fn path(&self) -> String {
        if self.module == "builtins" {
            self.name.clone()
        } else {
            format!("{}.{}", self.module, self.name)
        }
    }

    /// Last segment of the qualified name
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn is_numpy_dtype(&self) -> bool {
        self.name == "dtype" && (self.module == "numpy" || self.module.starts_with("numpy."))
    }
}

/// An instance created by `NEWOBJ`, `OBJ`, `INST` or an uninterpreted
/// `REDUCE`. Nothing is executed: the class and everything handed to it is
/// recorded as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub class: Global,
    /// Constructor (or reduce callable) arguments
    pub args: Vec<Value>,
    /// Argument of `BUILD`, usually the instance `__dict__`
    pub state: Option<Value>,
    /// Items added by `APPEND(S)` / `ADDITEMS` (list and set subclasses)
    pub items: Vec<Value>,
    /// Entries added by `SETITEM(S)` (dict subclasses)
    pub entries: Vec<(Value, Value)>,
}

impl Object {
    pub fn new(class: Global, args: Vec<Value>) -> Self {
        Self {
            class,
            args,
            state: None,
            items: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Instance attribute, looked up the way `object.__getattribute__`
    /// finds values restored by the default `__setstate__`.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        match self.state.as_ref()? {
            Value::Dict(entries) => lookup(entries, name),
            // (__dict__, __slots__ state)
            Value::Tuple(parts) if parts.len() == 2 => parts.iter().find_map(|part| match part {
                Value::Dict(entries) => lookup(entries, name),
                _ => None,
            }),
            _ => None,
        }
    }
}

fn lookup<'a>(entries: &'a [(Value, Value)], name: &str) -> Option<&'a Value> {
    // Later SETITEMs win, as in a dict.
    entries.iter().rev().find_map(|(key, value)| match key {
        Value::Str(key) if key == name => Some(value),
        _ => None,
    })
}

/// A Python object graph with shared references resolved to copies
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    /// Integer wider than 64 bits, little-endian two's complement
    BigInt(Vec<u8>),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    ByteArray(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Set(Vec<Value>),
    FrozenSet(Vec<Value>),
    Global(Global),
    Object(Box<Object>),
    Array(NdArray),
    /// numpy scalar, stored as a zero-dimensional array
    Scalar(NdArray),
}

impl Value {
    /// Fully qualified name of the runtime type, as inside Python's
    /// `<class '...'>`
    pub fn type_name(&self) -> String {
        match self {
            Value::Object(object) => object.class.path(),
            Value::Array(_) => "numpy.ndarray".to_string(),
            Value::Scalar(scalar) => format!("numpy.{}", scalar.dtype.scalar_name()),
            other => other.class_name(),
        }
    }

    /// Name used in Python's error messages (`'dict' object has no ...`)
    pub fn class_name(&self) -> String {
        let name = match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::BigInt(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::ByteArray(_) => "bytearray",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::FrozenSet(_) => "frozenset",
            Value::Global(_) => "type",
            Value::Object(object) => object.class.short_name(),
            Value::Array(_) | Value::Scalar(_) => return self.type_name(),
        };
        name.to_string()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Items of a list or tuple
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }
}
