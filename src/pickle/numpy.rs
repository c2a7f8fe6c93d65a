//! numpy arrays, scalars and dtypes as they appear in pickle streams
//!
//! numpy never pickles its buffers through a dedicated opcode: arrays travel
//! either as a `_reconstruct` call followed by a `BUILD` state tuple, as a
//! `_frombuffer` call (protocol 5), or, inside joblib files, as raw bytes
//! written right after a `NumpyArrayWrapper` object. All three paths end up
//! in [`NdArray::from_bytes`].

use crate::pickle::error::{PickleError, Result};
use crate::pickle::value::{Global, Value};

/// Module spellings numpy has used for its C-level helpers
const MULTIARRAY_MODULES: [&str; 2] = ["numpy.core.multiarray", "numpy._core.multiarray"];
const NUMERIC_MODULES: [&str; 2] = ["numpy.core.numeric", "numpy._core.numeric"];

/// Well-known numpy callables the machine interprets instead of recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumpyCall {
    /// `multiarray._reconstruct(cls, shape, typecode)`, completed by `BUILD`
    Reconstruct,
    /// `multiarray.scalar(dtype, payload)`
    Scalar,
    /// `numeric._frombuffer(buffer, dtype, shape, order)`
    FromBuffer,
}

impl NumpyCall {
    pub fn identify(global: &Global) -> Option<Self> {
        let module = global.module.as_str();
        match global.name.as_str() {
            "_reconstruct" if MULTIARRAY_MODULES.contains(&module) => Some(Self::Reconstruct),
            "scalar" if MULTIARRAY_MODULES.contains(&module) => Some(Self::Scalar),
            "_frombuffer" if NUMERIC_MODULES.contains(&module) => Some(Self::FromBuffer),
            _ => None,
        }
    }
}

/// Byte order of a dtype
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
    /// Single-byte and opaque types (`|`)
    NotApplicable,
}

impl ByteOrder {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "<" => Some(Self::Little),
            ">" => Some(Self::Big),
            "|" => Some(Self::NotApplicable),
            "=" if cfg!(target_endian = "big") => Some(Self::Big),
            "=" => Some(Self::Little),
            _ => None,
        }
    }
}

/// Element type of an array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DType {
    /// numpy kind character (`b`, `i`, `u`, `f`, `c`, `U`, `S`, `V`, `O`, `M`, `m`)
    pub kind: char,
    /// Size of one element in bytes
    pub itemsize: usize,
    pub byte_order: ByteOrder,
}

impl DType {
    /// Parse a pickled typecode such as `f8`, `U10` or `V56`.
    ///
    /// `U` codes count characters, every other kind counts bytes.
    pub fn parse(code: &str, byte_order: Option<ByteOrder>) -> Result<Self> {
        let invalid = || PickleError::UnsupportedDtype(code.to_string());

        let (prefix_order, body) = match code.get(..1).and_then(ByteOrder::from_symbol) {
            Some(order) => (Some(order), &code[1..]),
            None => (None, code),
        };

        let mut chars = body.chars();
        let kind = chars.next().ok_or_else(invalid)?;
        let digits = chars.as_str();
        let size: usize = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| invalid())?
        };

        let itemsize = match kind {
            'U' => size.checked_mul(4).ok_or_else(invalid)?,
            'b' if size == 0 => 1,
            'b' | 'i' | 'u' | 'f' | 'c' | 'S' | 'V' | 'O' | 'M' | 'm' => size,
            _ => return Err(invalid()),
        };

        let byte_order = byte_order
            .or(prefix_order)
            .unwrap_or(if itemsize > 1 {
                ByteOrder::Little
            } else {
                ByteOrder::NotApplicable
            });

        Ok(Self {
            kind,
            itemsize,
            byte_order,
        })
    }

    /// Read a dtype back from its pickled form: a `numpy.dtype(code, ...)`
    /// call whose `BUILD` state carries the byte order at index 1.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(object) if object.class.is_numpy_dtype() => {
                let code = match object.args.first() {
                    Some(Value::Str(code)) => code,
                    other => {
                        return Err(PickleError::UnexpectedValue {
                            op: "dtype",
                            expected: "a typecode string",
                            found: other.map_or_else(|| "nothing".to_string(), Value::type_name),
                        })
                    }
                };
                let byte_order = match &object.state {
                    Some(Value::Tuple(state)) => match state.get(1) {
                        Some(Value::Str(symbol)) => ByteOrder::from_symbol(symbol),
                        _ => None,
                    },
                    _ => None,
                };
                Self::parse(code, byte_order)
            }
            Value::Str(code) => Self::parse(code, None),
            other => Err(PickleError::UnexpectedValue {
                op: "dtype",
                expected: "numpy.dtype",
                found: other.type_name(),
            }),
        }
    }

    /// Name of the numpy scalar type holding one element of this dtype
    pub fn scalar_name(&self) -> String {
        let bits = self.itemsize.saturating_mul(8);
        match self.kind {
            'b' => "bool_".to_string(),
            'i' => format!("int{bits}"),
            'u' => format!("uint{bits}"),
            'f' => format!("float{bits}"),
            'c' => format!("complex{bits}"),
            'U' => "str_".to_string(),
            'S' => "bytes_".to_string(),
            'V' => "void".to_string(),
            'O' => "object_".to_string(),
            'M' => "datetime64".to_string(),
            'm' => "timedelta64".to_string(),
            _ => "generic".to_string(),
        }
    }

    /// Decode `count` packed elements.
    pub fn decode(&self, raw: &[u8], count: usize) -> Result<ArrayData> {
        let expected = count
            .checked_mul(self.itemsize)
            .ok_or(PickleError::ArrayTooBig)?;
        if raw.len() != expected {
            return Err(PickleError::ArraySize {
                expected,
                actual: raw.len(),
            });
        }
        if self.itemsize == 0 {
            return Ok(ArrayData::Raw(Vec::new()));
        }

        let big = self.byte_order == ByteOrder::Big;
        let chunks = raw.chunks_exact(self.itemsize);

        let data = match (self.kind, self.itemsize) {
            ('b', 1) => ArrayData::Bool(raw.iter().map(|b| *b != 0).collect()),
            ('i', 1 | 2 | 4 | 8) => ArrayData::Int(
                chunks
                    .map(|c| sign_extend(read_uint(c, big), c.len()))
                    .collect(),
            ),
            ('u', 1 | 2 | 4 | 8) => ArrayData::UInt(chunks.map(|c| read_uint(c, big)).collect()),
            ('f', 2) => ArrayData::Float(
                chunks
                    .map(|c| half_to_f64(read_uint(c, big) as u16))
                    .collect(),
            ),
            ('f', 4) => ArrayData::Float32(
                chunks
                    .map(|c| f32::from_bits(read_uint(c, big) as u32))
                    .collect(),
            ),
            ('f', 8) => ArrayData::Float(chunks.map(|c| f64::from_bits(read_uint(c, big))).collect()),
            ('U', _) => ArrayData::Str(chunks.map(|c| decode_utf32(c, big)).collect()),
            ('S', _) => ArrayData::Bytes(chunks.map(|c| trim_nul(c).to_vec()).collect()),
            ('O', _) => return Err(PickleError::UnsupportedDtype("O".to_string())),
            _ => ArrayData::Raw(raw.to_vec()),
        };
        Ok(data)
    }
}

fn read_uint(chunk: &[u8], big_endian: bool) -> u64 {
    let fold = |acc: u64, byte: &u8| (acc << 8) | u64::from(*byte);
    if big_endian {
        chunk.iter().fold(0, fold)
    } else {
        chunk.iter().rev().fold(0, fold)
    }
}

fn sign_extend(value: u64, width: usize) -> i64 {
    let shift = 64 - 8 * width as u32;
    ((value << shift) as i64) >> shift
}

fn half_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = i32::from((bits >> 10) & 0x1f);
    let fraction = f64::from(bits & 0x03ff);
    match exponent {
        0 => sign * fraction * 2f64.powi(-24),
        0x1f if fraction == 0.0 => sign * f64::INFINITY,
        0x1f => f64::NAN,
        _ => sign * (1.0 + fraction / 1024.0) * 2f64.powi(exponent - 15),
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

fn decode_utf32(chunk: &[u8], big_endian: bool) -> String {
    let mut text: String = chunk
        .chunks_exact(4)
        .map(|unit| char::from_u32(read_uint(unit, big_endian) as u32).unwrap_or('\u{fffd}'))
        .collect();
    let trimmed = text.trim_end_matches('\0').len();
    text.truncate(trimmed);
    text
}

/// Typed element storage, in memory order
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    /// `f2` (widened) and `f8`
    Float(Vec<f64>),
    Float32(Vec<f32>),
    Str(Vec<String>),
    Bytes(Vec<Vec<u8>>),
    Object(Vec<Value>),
    /// Structured, complex, datetime and any other dtype kept as packed bytes
    Raw(Vec<u8>),
}

impl ArrayData {
    fn element(&self, index: usize, itemsize: usize) -> Value {
        match self {
            ArrayData::Bool(v) => Value::Bool(v[index]),
            ArrayData::Int(v) => Value::Int(v[index]),
            ArrayData::UInt(v) => match i64::try_from(v[index]) {
                Ok(n) => Value::Int(n),
                Err(_) => {
                    let mut bytes = v[index].to_le_bytes().to_vec();
                    bytes.push(0);
                    Value::BigInt(bytes)
                }
            },
            ArrayData::Float(v) => Value::Float(v[index]),
            ArrayData::Float32(v) => Value::Float(f64::from(v[index])),
            ArrayData::Str(v) => Value::Str(v[index].clone()),
            ArrayData::Bytes(v) => Value::Bytes(v[index].clone()),
            ArrayData::Object(v) => v[index].clone(),
            ArrayData::Raw(v) => Value::Bytes(v[index * itemsize..(index + 1) * itemsize].to_vec()),
        }
    }

    fn gather(&self, indices: &[usize], itemsize: usize) -> ArrayData {
        fn pick<T: Clone>(v: &[T], indices: &[usize]) -> Vec<T> {
            indices.iter().map(|&i| v[i].clone()).collect()
        }
        match self {
            ArrayData::Bool(v) => ArrayData::Bool(pick(v, indices)),
            ArrayData::Int(v) => ArrayData::Int(pick(v, indices)),
            ArrayData::UInt(v) => ArrayData::UInt(pick(v, indices)),
            ArrayData::Float(v) => ArrayData::Float(pick(v, indices)),
            ArrayData::Float32(v) => ArrayData::Float32(pick(v, indices)),
            ArrayData::Str(v) => ArrayData::Str(pick(v, indices)),
            ArrayData::Bytes(v) => ArrayData::Bytes(pick(v, indices)),
            ArrayData::Object(v) => ArrayData::Object(pick(v, indices)),
            ArrayData::Raw(v) => ArrayData::Raw(
                indices
                    .iter()
                    .flat_map(|&i| v[i * itemsize..(i + 1) * itemsize].iter().copied())
                    .collect(),
            ),
        }
    }
}

/// A decoded numpy array. Zero-dimensional arrays also carry numpy scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    pub dtype: DType,
    pub shape: Vec<usize>,
    /// Storage is column-major (`order='F'`)
    pub fortran_order: bool,
    pub data: ArrayData,
}

impl NdArray {
    pub fn from_bytes(dtype: DType, shape: Vec<usize>, fortran_order: bool, raw: &[u8]) -> Result<Self> {
        let count = element_count(&shape)?;
        let data = dtype.decode(raw, count)?;
        Ok(Self {
            dtype,
            shape,
            fortran_order,
            data,
        })
    }

    pub fn from_objects(dtype: DType, shape: Vec<usize>, fortran_order: bool, items: Vec<Value>) -> Result<Self> {
        let count = element_count(&shape)?;
        if items.len() != count {
            return Err(PickleError::ArraySize {
                expected: count,
                actual: items.len(),
            });
        }
        Ok(Self {
            dtype,
            shape,
            fortran_order,
            data: ArrayData::Object(items),
        })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Element at a row-major flat index, as a plain Python value
    /// (numpy's `item()`)
    pub fn item(&self, index: usize) -> Value {
        self.data.element(self.storage_index(index), self.dtype.itemsize)
    }

    /// Element at a row-major flat index as indexing yields it. Single
    /// precision floats stay numpy scalars so they print at their own
    /// precision; everything else comes back as a plain value.
    pub fn get(&self, index: usize) -> Value {
        match &self.data {
            ArrayData::Float32(v) => Value::Scalar(NdArray {
                dtype: self.dtype.clone(),
                shape: Vec::new(),
                fortran_order: false,
                data: ArrayData::Float32(vec![v[self.storage_index(index)]]),
            }),
            _ => self.item(index),
        }
    }

    /// Elements in row-major order, as indexing yields them
    pub fn elements(&self) -> Vec<Value> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// What iterating the array yields: elements for 1-D arrays, sub-arrays
    /// along the first axis otherwise. `None` for zero-dimensional arrays.
    pub fn outer(&self) -> Option<Vec<Value>> {
        match self.ndim() {
            0 => None,
            1 => Some(self.elements()),
            _ => {
                let inner_shape = self.shape[1..].to_vec();
                let inner: usize = inner_shape.iter().product();
                let rows = (0..self.shape[0])
                    .map(|row| {
                        let indices: Vec<usize> = (row * inner..(row + 1) * inner)
                            .map(|i| self.storage_index(i))
                            .collect();
                        Value::Array(NdArray {
                            dtype: self.dtype.clone(),
                            shape: inner_shape.clone(),
                            fortran_order: false,
                            data: self.data.gather(&indices, self.dtype.itemsize),
                        })
                    })
                    .collect();
                Some(rows)
            }
        }
    }

    fn storage_index(&self, row_major: usize) -> usize {
        if !self.fortran_order || self.ndim() < 2 {
            return row_major;
        }
        let mut remainder = row_major;
        let mut coords = vec![0; self.ndim()];
        for (axis, extent) in self.shape.iter().enumerate().rev() {
            coords[axis] = remainder % extent;
            remainder /= extent;
        }
        let mut offset = 0;
        let mut stride = 1;
        for (coord, extent) in coords.iter().zip(&self.shape) {
            offset += coord * stride;
            stride *= extent;
        }
        offset
    }
}

/// Number of elements an array of this shape holds
pub fn element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
        .ok_or(PickleError::ArrayTooBig)
}

/// Shape tuple of a pickled array
pub fn shape_from_value(value: &Value) -> Result<Vec<usize>> {
    let dims = match value {
        Value::Tuple(dims) | Value::List(dims) => dims,
        Value::Int(n) => return usize::try_from(*n).map(|n| vec![n]).map_err(|_| bad_shape(value)),
        other => return Err(bad_shape(other)),
    };
    dims.iter()
        .map(|dim| match dim {
            Value::Int(n) => usize::try_from(*n).map_err(|_| bad_shape(value)),
            _ => Err(bad_shape(value)),
        })
        .collect()
}

fn bad_shape(found: &Value) -> PickleError {
    PickleError::UnexpectedValue {
        op: "array shape",
        expected: "a tuple of non-negative ints",
        found: found.type_name(),
    }
}

/// Raw payload of a pickled buffer. Protocol 0-2 streams carry bytes as
/// latin-1 text.
pub fn payload_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Bytes(bytes) | Value::ByteArray(bytes) => Some(bytes.clone()),
        Value::Str(text) => text.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect(),
        _ => None,
    }
}
