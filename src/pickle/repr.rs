//! Python-style `repr()` of decoded values

use crate::pickle::numpy::{ArrayData, NdArray};
use crate::pickle::value::Value;

/// `repr()` of a float: shortest round-trip digits, positional notation
/// for exponents in `-4..16`, scientific (`1e+16`, `1e-05`) otherwise.
pub fn float_repr(value: f64) -> String {
    match special_float(value) {
        Some(text) => text.to_string(),
        // Rust's `{:e}` already yields the shortest digits that round-trip.
        None => positional(format!("{value:e}")),
    }
}

/// `repr()` of a numpy `float32`: the same layout as [`float_repr`] over
/// the shortest digits that round-trip at single precision.
pub fn float32_repr(value: f32) -> String {
    match special_float(f64::from(value)) {
        Some(text) => text.to_string(),
        None => positional(format!("{value:e}")),
    }
}

fn special_float(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("nan")
    } else if value.is_infinite() {
        Some(if value > 0.0 { "inf" } else { "-inf" })
    } else if value == 0.0 {
        Some(if value.is_sign_negative() { "-0.0" } else { "0.0" })
    } else {
        None
    }
}

fn positional(scientific: String) -> String {
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if (-4..16).contains(&exponent) {
        if exponent < 0 {
            let zeros = "0".repeat((-exponent - 1) as usize);
            return format!("{sign}0.{zeros}{digits}");
        }
        let split = exponent as usize + 1;
        if digits.len() <= split {
            let zeros = "0".repeat(split - digits.len());
            format!("{sign}{digits}{zeros}.0")
        } else {
            format!("{sign}{}.{}", &digits[..split], &digits[split..])
        }
    } else {
        let (lead, rest) = digits.split_at(1);
        let fraction = if rest.is_empty() {
            String::new()
        } else {
            format!(".{rest}")
        };
        let exponent_sign = if exponent < 0 { '-' } else { '+' };
        format!("{sign}{lead}{fraction}e{exponent_sign}{:02}", exponent.abs())
    }
}

/// Python-style `repr()` of a value.
///
/// Instances print as `<module.Class object>` since no address exists,
/// numpy scalars print as the plain number they hold.
pub fn repr(value: &Value) -> String {
    match value {
        Value::None => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(n) => n.to_string(),
        Value::BigInt(bytes) => bigint_to_decimal(bytes),
        Value::Float(f) => float_repr(*f),
        Value::Str(s) => str_repr(s),
        Value::Bytes(bytes) => bytes_repr(bytes),
        Value::ByteArray(bytes) => format!("bytearray({})", bytes_repr(bytes)),
        Value::List(items) => format!("[{}]", join(items)),
        Value::Tuple(items) if items.len() == 1 => format!("({},)", repr(&items[0])),
        Value::Tuple(items) => format!("({})", join(items)),
        Value::Dict(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(key, value)| format!("{}: {}", repr(key), repr(value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Set(items) if items.is_empty() => "set()".to_string(),
        Value::Set(items) => format!("{{{}}}", join(items)),
        Value::FrozenSet(items) if items.is_empty() => "frozenset()".to_string(),
        Value::FrozenSet(items) => format!("frozenset({{{}}})", join(items)),
        Value::Global(global) => format!("<class '{}'>", global.path()),
        Value::Object(object) => format!("<{} object>", object.class.path()),
        Value::Array(array) => format!("array({})", array_body(array)),
        Value::Scalar(scalar) => match &scalar.data {
            ArrayData::Float32(v) if v.len() == 1 => float32_repr(v[0]),
            _ => repr(&scalar.item(0)),
        },
    }
}

fn join(items: &[Value]) -> String {
    items.iter().map(repr).collect::<Vec<_>>().join(", ")
}

fn array_body(array: &NdArray) -> String {
    match array.outer() {
        None => repr(&array.get(0)),
        Some(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::Array(inner) => array_body(inner),
                    other => repr(other),
                })
                .collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

fn quote_for(has_single: bool, has_double: bool) -> char {
    if has_single && !has_double {
        '"'
    } else {
        '\''
    }
}

fn str_repr(s: &str) -> String {
    let quote = quote_for(s.contains('\''), s.contains('"'));
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn bytes_repr(bytes: &[u8]) -> String {
    let quote = quote_for(bytes.contains(&b'\''), bytes.contains(&b'"'));
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(quote);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if char::from(b) == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7e => out.push(char::from(b)),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push(quote);
    out
}

/// Decimal text of a little-endian two's complement integer
fn bigint_to_decimal(bytes: &[u8]) -> String {
    let negative = bytes.last().is_some_and(|b| b & 0x80 != 0);
    let mut magnitude: Vec<u8> = bytes.to_vec();
    if negative {
        let mut carry = true;
        for byte in magnitude.iter_mut() {
            let (v, overflow) = (!*byte).overflowing_add(u8::from(carry));
            *byte = v;
            carry = overflow;
        }
    }

    // Repeated division by 10 over big-endian base-256 digits.
    let mut big_endian: Vec<u8> = magnitude.into_iter().rev().collect();
    let mut digits = Vec::new();
    while big_endian.iter().any(|b| *b != 0) {
        let mut remainder = 0u32;
        for byte in big_endian.iter_mut() {
            let current = (remainder << 8) | u32::from(*byte);
            *byte = (current / 10) as u8;
            remainder = current % 10;
        }
        digits.push(char::from(b'0' + remainder as u8));
    }
    if digits.is_empty() {
        digits.push('0');
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}
