//! Field values as recorded in trace trees.

use std::fmt;

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bit(bool),
    UInt(u64),
    Int(i64),
    /// IEEE 754 value, widened from 32 bits where needed.
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
    /// Enumerated value: constant name and wire value.
    Enum { name: &'static str, value: u64 },
    /// Number of padding bytes skipped or written.
    Padding(usize),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(x) => Some(*x),
            Value::Int(x) => u64::try_from(*x).ok(),
            Value::Bit(b) => Some(u64::from(*b)),
            Value::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            Value::UInt(x) => i64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bit(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Fixture-literal form: `0x1f`, `1.5`, `true`, `hex"0a0b"`, `"text"`, `NAME`, `padding(1)`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bit(b) => write!(f, "{}", b),
            Value::UInt(x) => write!(f, "{:#x}", x),
            Value::Int(x) => write!(f, "{}", x),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bytes(b) => write!(f, "hex\"{}\"", hex::encode(b)),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Enum { name, .. } => write!(f, "{}", name),
            Value::Padding(n) => write!(f, "padding({})", n),
        }
    }
}
