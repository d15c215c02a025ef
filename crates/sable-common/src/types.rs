//! Column types, field values and comparison operators.

use crate::error::{Result, SableError};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Maximum number of bytes stored for a string field.
pub const STRING_LEN: usize = 128;

/// Column type.
///
/// Every type has a fixed on-disk width so tuples of one schema all have the
/// same size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// 32-bit signed integer, big-endian.
    Int,
    /// Length-prefixed string padded to [`STRING_LEN`] bytes.
    String,
}

impl Type {
    /// Returns the number of bytes a field of this type occupies on disk.
    pub const fn len(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::String => 4 + STRING_LEN,
        }
    }

    /// Parses a catalog type name (`int` or `string`, any case).
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("int") {
            Some(Type::Int)
        } else if name.eq_ignore_ascii_case("string") {
            Some(Type::String)
        } else {
            None
        }
    }

    /// Reads one field of this type from the front of `buf`.
    pub fn parse(&self, buf: &mut &[u8]) -> Result<Field> {
        if buf.remaining() < self.len() {
            return Err(SableError::CorruptField(format!(
                "need {} bytes for {}, {} left",
                self.len(),
                self,
                buf.remaining()
            )));
        }

        match self {
            Type::Int => Ok(Field::Int(buf.get_i32())),
            Type::String => {
                let len = buf.get_i32();
                if len < 0 || len as usize > STRING_LEN {
                    return Err(SableError::CorruptField(format!(
                        "string length {len} outside 0..={STRING_LEN}"
                    )));
                }
                let len = len as usize;
                let text = std::str::from_utf8(&buf[..len])
                    .map_err(|e| SableError::CorruptField(e.to_string()))?
                    .to_string();
                buf.advance(STRING_LEN);
                Ok(Field::String(text))
            }
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "INT"),
            Type::String => write!(f, "STRING"),
        }
    }
}

/// Comparison operator used by predicates and selectivity estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    Equals,
    GreaterThan,
    LessThan,
    LessThanOrEq,
    GreaterThanOrEq,
    Like,
    NotEquals,
}

impl Op {
    pub const ALL: [Op; 7] = [
        Op::Equals,
        Op::GreaterThan,
        Op::LessThan,
        Op::LessThanOrEq,
        Op::GreaterThanOrEq,
        Op::Like,
        Op::NotEquals,
    ];

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Op::Equals | Op::Like => ordering == Ordering::Equal,
            Op::NotEquals => ordering != Ordering::Equal,
            Op::GreaterThan => ordering == Ordering::Greater,
            Op::GreaterThanOrEq => ordering != Ordering::Less,
            Op::LessThan => ordering == Ordering::Less,
            Op::LessThanOrEq => ordering != Ordering::Greater,
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Op::Equals => "=",
            Op::GreaterThan => ">",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::GreaterThanOrEq => ">=",
            Op::Like => "LIKE",
            Op::NotEquals => "<>",
        };
        write!(f, "{}", symbol)
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    Int(i32),
    String(String),
}

impl Field {
    /// Builds a string field, truncating to [`STRING_LEN`] bytes on a
    /// character boundary.
    pub fn string(value: impl Into<String>) -> Self {
        let mut value = value.into();
        let end = clipped_len(&value);
        value.truncate(end);
        Field::String(value)
    }

    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::String(_) => Type::String,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Int(v) => Some(*v),
            Field::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Int(_) => None,
            Field::String(s) => Some(s),
        }
    }

    /// Writes exactly `self.field_type().len()` bytes.
    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        match self {
            Field::Int(v) => buf.put_i32(*v),
            Field::String(s) => {
                let bytes = &s.as_bytes()[..clipped_len(s)];
                buf.put_i32(bytes.len() as i32);
                buf.put_slice(bytes);
                buf.put_bytes(0, STRING_LEN - bytes.len());
            }
        }
    }

    /// Evaluates `self op other`.
    ///
    /// For strings `Like` is a substring test; for integers it is equality.
    pub fn compare(&self, op: Op, other: &Field) -> Result<bool> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Ok(op.holds(a.cmp(b))),
            (Field::String(a), Field::String(b)) => match op {
                Op::Like => Ok(a.contains(b.as_str())),
                _ => Ok(op.holds(a.cmp(b))),
            },
            _ => Err(SableError::TypeMismatch {
                expected: self.field_type().to_string(),
                actual: other.field_type().to_string(),
            }),
        }
    }
}

/// Longest prefix of `s` that fits in [`STRING_LEN`] bytes without splitting
/// a character.
fn clipped_len(s: &str) -> usize {
    if s.len() <= STRING_LEN {
        return s.len();
    }
    let mut end = STRING_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::String(s) => write!(f, "{}", s),
        }
    }
}
