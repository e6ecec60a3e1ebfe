//! Binary field formats
//!
//! Every field is fixed size and big-endian. A [`Layout`] is an ordered list
//! of field types describing a complete payload.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PusError, PusResult};

/// Format descriptor of a single field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl FieldType {
    /// Size of the encoded field in bytes
    pub fn size(&self) -> usize {
        match self {
            FieldType::Bool | FieldType::U8 | FieldType::I8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::F32 => 4,
            FieldType::U64 | FieldType::I64 | FieldType::F64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::U8 => "u8",
            FieldType::U16 => "u16",
            FieldType::U32 => "u32",
            FieldType::U64 => "u64",
            FieldType::I8 => "i8",
            FieldType::I16 => "i16",
            FieldType::I32 => "i32",
            FieldType::I64 => "i64",
            FieldType::F32 => "f32",
            FieldType::F64 => "f64",
        }
    }

    /// Largest value of an unsigned field, `None` for other types
    pub fn unsigned_max(&self) -> Option<u64> {
        match self {
            FieldType::U8 => Some(u8::MAX as u64),
            FieldType::U16 => Some(u16::MAX as u64),
            FieldType::U32 => Some(u32::MAX as u64),
            FieldType::U64 => Some(u64::MAX),
            _ => None,
        }
    }

    /// Build a value of this unsigned type, checking its range
    pub fn unsigned_value(&self, value: u64) -> PusResult<ParamValue> {
        let max = self.unsigned_max().ok_or(PusError::TypeMismatch {
            expected: "unsigned integer",
            actual: self.name(),
        })?;
        if value > max {
            return Err(PusError::InvalidReport(format!(
                "{} does not fit in {}",
                value,
                self.name()
            )));
        }
        Ok(match self {
            FieldType::U8 => ParamValue::U8(value as u8),
            FieldType::U16 => ParamValue::U16(value as u16),
            FieldType::U32 => ParamValue::U32(value as u32),
            _ => ParamValue::U64(value),
        })
    }

    /// Append `value` to `out`; the value must be of this type
    pub fn encode(&self, value: &ParamValue, out: &mut Vec<u8>) -> PusResult<()> {
        if value.field_type() != *self {
            return Err(PusError::TypeMismatch {
                expected: self.name(),
                actual: value.field_type().name(),
            });
        }
        match *value {
            ParamValue::Bool(v) => out.push(v as u8),
            ParamValue::U8(v) => out.push(v),
            ParamValue::U16(v) => out.extend_from_slice(&v.to_be_bytes()),
            ParamValue::U32(v) => out.extend_from_slice(&v.to_be_bytes()),
            ParamValue::U64(v) => out.extend_from_slice(&v.to_be_bytes()),
            ParamValue::I8(v) => out.extend_from_slice(&v.to_be_bytes()),
            ParamValue::I16(v) => out.extend_from_slice(&v.to_be_bytes()),
            ParamValue::I32(v) => out.extend_from_slice(&v.to_be_bytes()),
            ParamValue::I64(v) => out.extend_from_slice(&v.to_be_bytes()),
            ParamValue::F32(v) => out.extend_from_slice(&v.to_be_bytes()),
            ParamValue::F64(v) => out.extend_from_slice(&v.to_be_bytes()),
        }
        Ok(())
    }

    /// Decode one field from the start of `data`
    pub fn decode(&self, data: &[u8]) -> PusResult<ParamValue> {
        let bytes = data.get(..self.size()).ok_or_else(|| {
            PusError::decode(format!(
                "{} needs {} bytes, {} available",
                self.name(),
                self.size(),
                data.len()
            ))
        })?;
        let value = match self {
            FieldType::Bool => match bytes[0] {
                0 => ParamValue::Bool(false),
                1 => ParamValue::Bool(true),
                other => return Err(PusError::decode(format!("invalid bool byte {:#04x}", other))),
            },
            FieldType::U8 => ParamValue::U8(bytes[0]),
            FieldType::U16 => ParamValue::U16(u16::from_be_bytes(array(bytes))),
            FieldType::U32 => ParamValue::U32(u32::from_be_bytes(array(bytes))),
            FieldType::U64 => ParamValue::U64(u64::from_be_bytes(array(bytes))),
            FieldType::I8 => ParamValue::I8(i8::from_be_bytes(array(bytes))),
            FieldType::I16 => ParamValue::I16(i16::from_be_bytes(array(bytes))),
            FieldType::I32 => ParamValue::I32(i32::from_be_bytes(array(bytes))),
            FieldType::I64 => ParamValue::I64(i64::from_be_bytes(array(bytes))),
            FieldType::F32 => ParamValue::F32(f32::from_be_bytes(array(bytes))),
            FieldType::F64 => ParamValue::F64(f64::from_be_bytes(array(bytes))),
        };
        Ok(value)
    }

    /// Append an unsigned value, checking its range
    pub fn encode_unsigned(&self, value: u64, out: &mut Vec<u8>) -> PusResult<()> {
        let value = self.unsigned_value(value)?;
        self.encode(&value, out)
    }

    /// Decode an unsigned field from the start of `data`
    pub fn decode_unsigned(&self, data: &[u8]) -> PusResult<u64> {
        self.decode(data)?.as_u64().ok_or(PusError::TypeMismatch {
            expected: "unsigned integer",
            actual: self.name(),
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Callers slice exactly N bytes first.
fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// A typed field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl ParamValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            ParamValue::Bool(_) => FieldType::Bool,
            ParamValue::U8(_) => FieldType::U8,
            ParamValue::U16(_) => FieldType::U16,
            ParamValue::U32(_) => FieldType::U32,
            ParamValue::U64(_) => FieldType::U64,
            ParamValue::I8(_) => FieldType::I8,
            ParamValue::I16(_) => FieldType::I16,
            ParamValue::I32(_) => FieldType::I32,
            ParamValue::I64(_) => FieldType::I64,
            ParamValue::F32(_) => FieldType::F32,
            ParamValue::F64(_) => FieldType::F64,
        }
    }

    /// Value of an unsigned variant
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            ParamValue::U8(v) => Some(v as u64),
            ParamValue::U16(v) => Some(v as u64),
            ParamValue::U32(v) => Some(v as u64),
            ParamValue::U64(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::U8(v) => write!(f, "{}", v),
            ParamValue::U16(v) => write!(f, "{}", v),
            ParamValue::U32(v) => write!(f, "{}", v),
            ParamValue::U64(v) => write!(f, "{}", v),
            ParamValue::I8(v) => write!(f, "{}", v),
            ParamValue::I16(v) => write!(f, "{}", v),
            ParamValue::I32(v) => write!(f, "{}", v),
            ParamValue::I64(v) => write!(f, "{}", v),
            ParamValue::F32(v) => write!(f, "{}", v),
            ParamValue::F64(v) => write!(f, "{}", v),
        }
    }
}

/// Ordered byte layout of a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    fields: Vec<FieldType>,
}

impl Layout {
    pub fn new(fields: Vec<FieldType>) -> Self {
        Self { fields }
    }

    /// Total encoded size in bytes
    pub fn size(&self) -> usize {
        self.fields.iter().map(FieldType::size).sum()
    }

    /// Encode one value per field, in order
    pub fn encode(&self, values: &[ParamValue]) -> PusResult<Vec<u8>> {
        if values.len() != self.fields.len() {
            return Err(PusError::decode(format!(
                "layout has {} fields, got {} values",
                self.fields.len(),
                values.len()
            )));
        }
        let mut out = Vec::with_capacity(self.size());
        for (field, value) in self.fields.iter().zip(values) {
            field.encode(value, &mut out)?;
        }
        Ok(out)
    }

    /// Decode a payload that must match the layout size exactly
    pub fn decode(&self, data: &[u8]) -> PusResult<Vec<ParamValue>> {
        if data.len() != self.size() {
            return Err(PusError::decode(format!(
                "expected {} bytes, got {}",
                self.size(),
                data.len()
            )));
        }
        let mut offset = 0;
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            values.push(field.decode(&data[offset..])?);
            offset += field.size();
        }
        Ok(values)
    }
}
