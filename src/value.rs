//! Typed result values.
//!
//! SQLite stores a closed set of value types. [`DataType`] is the runtime
//! type tag of a column, [`Blob`] is a non-owning view into row-owned binary
//! data, and [`Value`] is the owned form used when binding heterogeneous
//! sequences of parameters.

use std::fmt;
use std::os::raw::c_int;
use std::str::FromStr;

use libsqlite3_sys as ffi;

use crate::core::{Error, Result};

/// Runtime type tag of a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Blob,
    Null,
}

impl DataType {
    pub(crate) fn from_native(code: c_int) -> Result<Self> {
        match code {
            ffi::SQLITE_INTEGER => Ok(DataType::Integer),
            ffi::SQLITE_FLOAT => Ok(DataType::Float),
            ffi::SQLITE_TEXT => Ok(DataType::Text),
            ffi::SQLITE_BLOB => Ok(DataType::Blob),
            ffi::SQLITE_NULL => Ok(DataType::Null),
            _ => Err(Error::Other(format!("unknown column type code: {code}"))),
        }
    }

    /// Human-readable label; round-trips through [`FromStr`].
    pub fn label(&self) -> &'static str {
        match self {
            DataType::Integer => "Integer",
            DataType::Float => "Float",
            DataType::Text => "Text",
            DataType::Blob => "Blob",
            DataType::Null => "Null",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Integer" => Ok(DataType::Integer),
            "Float" => Ok(DataType::Float),
            "Text" => Ok(DataType::Text),
            "Blob" => Ok(DataType::Blob),
            "Null" => Ok(DataType::Null),
            _ => Err(Error::Other(format!("unknown data type label: {s}"))),
        }
    }
}

/// Non-owning view over binary column data.
///
/// The bytes belong to the statement's current row and are invalidated by the
/// next `step`, `reset` or finalize. The borrow of the statement encoded in
/// the lifetime makes that rule compiler-enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blob<'a> {
    bytes: &'a [u8],
}

impl<'a> Blob<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Blob { bytes }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl<'a> From<&'a [u8]> for Blob<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Blob::new(bytes)
    }
}

/// Owned value, used to bind heterogeneous parameter sequences with
/// [`Statement::bind_all`](crate::Statement::bind_all).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Null,
}

impl Value {
    /// The type tag this value binds as.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::Real(_) => DataType::Float,
            Value::Text(_) => DataType::Text,
            Value::Blob(_) => DataType::Blob,
            Value::Null => DataType::Null,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}
