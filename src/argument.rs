//! Typed argument cells
//!
//! An [`Argument`] is one typed cell of a message: the builder consumes a
//! sequence of them and the parser emits one sequence per decoded message.
//! Blobs are exposed one byte per cell on the way out, mirroring the way
//! untyped hosts handle opaque data.

use serde::{Deserialize, Serialize};

/// One typed message argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    /// 32-bit signed integer ('i')
    Int(i32),
    /// 32-bit float ('f')
    Float(f32),
    /// Null-terminated, 4-byte-aligned string ('s')
    String(String),
    /// One byte of a blob ('b')
    BlobByte(u8),
    /// Host cell that could not be classified; the builder skips these
    Untyped,
}

impl Argument {
    /// Type-tag character for this argument, used when the encoder
    /// synthesizes a tag string from an untagged argument list
    pub fn tag(&self) -> Option<char> {
        match self {
            Self::Int(_) => Some('i'),
            Self::Float(_) => Some('f'),
            Self::String(_) => Some('s'),
            Self::BlobByte(_) => Some('b'),
            Self::Untyped => None,
        }
    }
}

impl From<i32> for Argument {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for Argument {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Argument {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Argument {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// One decoded message, as delivered to the parser's output sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedMessage {
    /// Slash-delimited address pattern
    pub address: String,
    /// Arguments in wire order
    pub args: Vec<Argument>,
    /// Scheduling delay resolved from the enclosing bundle's time tag,
    /// 0 for a message not inside a bundle
    pub delay_ms: f64,
}
