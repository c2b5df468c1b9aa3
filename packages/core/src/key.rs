//! Primary-key types.

use std::fmt;
use std::hash::Hash;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{DataValue, TypeDesc};

/// A type usable as a datastore primary key.
///
/// Keys are scalar: they round-trip through a single `DataValue` and are
/// stored in one document field.
pub trait DataKey:
    Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static
{
    /// The declared type keys decode against.
    fn type_desc() -> TypeDesc;

    /// Encode this key.
    fn to_value(&self) -> DataValue;

    /// Decode a key from its value form.
    fn from_value(value: DataValue) -> Result<Self>;
}

impl DataKey for i32 {
    fn type_desc() -> TypeDesc {
        TypeDesc::Int32
    }

    fn to_value(&self) -> DataValue {
        DataValue::Int(i64::from(*self))
    }

    fn from_value(value: DataValue) -> Result<Self> {
        value.to_i32()
    }
}

impl DataKey for i64 {
    fn type_desc() -> TypeDesc {
        TypeDesc::Int64
    }

    fn to_value(&self) -> DataValue {
        DataValue::Int(*self)
    }

    fn from_value(value: DataValue) -> Result<Self> {
        value.to_i64()
    }
}

impl DataKey for String {
    fn type_desc() -> TypeDesc {
        TypeDesc::String
    }

    fn to_value(&self) -> DataValue {
        DataValue::String(self.clone())
    }

    fn from_value(value: DataValue) -> Result<Self> {
        value.into_string()
    }
}

impl DataKey for Uuid {
    fn type_desc() -> TypeDesc {
        TypeDesc::String
    }

    fn to_value(&self) -> DataValue {
        DataValue::String(self.to_string())
    }

    fn from_value(value: DataValue) -> Result<Self> {
        let text = value.into_string()?;
        text.parse()
            .map_err(|_| Error::decode("uuid", format!("`{}`", text)))
    }
}
