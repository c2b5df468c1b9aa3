//! The Document type - the tree-shaped value exchanged with storage.
//!
//! A `Document` is the universal data representation at the storage seam.
//! It maps directly onto BSON, JSON, MessagePack, etc., but is
//! encoding-agnostic; the table layer owns the wire format.
//!
//! # Design Notes
//!
//! - Uses `BTreeMap` for deterministic ordering (important for comparison)
//! - Keeps 32- and 64-bit integers apart so numeric narrowing stays explicit
//! - Includes `Bytes` for binary data (unlike JSON, but like BSON/CBOR)

use std::collections::BTreeMap;

/// Reserved map key carrying the registered type name of a polymorphic value.
pub const CLASS_NAME_FIELD: &str = "__class";

/// A tree-shaped value read from or written to a data table.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Document {
    /// Absence of a value. Distinct from "field doesn't exist".
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// 64-bit floating point.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data (for formats that support it).
    Bytes(Vec<u8>),
    /// Ordered sequence of documents.
    Array(Vec<Document>),
    /// Key-value map with string keys.
    Map(BTreeMap<String, Document>),
}

impl Document {
    /// Create a null document.
    pub fn null() -> Self {
        Document::Null
    }

    /// Create an empty map document.
    pub fn map() -> Self {
        Document::Map(BTreeMap::new())
    }

    /// Create an empty array document.
    pub fn array() -> Self {
        Document::Array(Vec::new())
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Null => "null",
            Document::Bool(_) => "bool",
            Document::Int32(_) => "int32",
            Document::Int64(_) => "int64",
            Document::Double(_) => "double",
            Document::String(_) => "string",
            Document::Bytes(_) => "bytes",
            Document::Array(_) => "array",
            Document::Map(_) => "map",
        }
    }

    /// Check if this document is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Document::Null)
    }

    /// Check if this document is a map node.
    pub fn is_map(&self) -> bool {
        matches!(self, Document::Map(_))
    }

    /// Check if this document is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Document::Array(_))
    }

    /// Check if this document is a scalar (not an array or map node).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Document::Array(_) | Document::Map(_))
    }

    /// Get a field of a map node by name.
    ///
    /// Returns `None` when the field is absent or this is not a map node.
    pub fn field(&self, name: &str) -> Option<&Document> {
        match self {
            Document::Map(map) => map.get(name),
            _ => None,
        }
    }

    /// Get the `__class` tag of a map node, if present.
    pub fn class_name(&self) -> Option<&str> {
        match self.field(CLASS_NAME_FIELD) {
            Some(Document::String(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    /// View as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Document::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// View as a signed 64-bit integer. Covers both integer widths.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Document::Int32(v) => Some(i64::from(*v)),
            Document::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// View as a 64-bit float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Document::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// View as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// View as an array slice.
    pub fn as_array(&self) -> Option<&[Document]> {
        match self {
            Document::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// View as a map node.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Document>> {
        match self {
            Document::Map(map) => Some(map),
            _ => None,
        }
    }
}

// Conversion from common types

impl From<bool> for Document {
    fn from(v: bool) -> Self {
        Document::Bool(v)
    }
}

impl From<i32> for Document {
    fn from(v: i32) -> Self {
        Document::Int32(v)
    }
}

impl From<i64> for Document {
    fn from(v: i64) -> Self {
        Document::Int64(v)
    }
}

impl From<f64> for Document {
    fn from(v: f64) -> Self {
        Document::Double(v)
    }
}

impl From<String> for Document {
    fn from(v: String) -> Self {
        Document::String(v)
    }
}

impl From<&str> for Document {
    fn from(v: &str) -> Self {
        Document::String(v.to_string())
    }
}

impl From<Vec<u8>> for Document {
    fn from(v: Vec<u8>) -> Self {
        Document::Bytes(v)
    }
}

impl<T: Into<Document>> From<Vec<T>> for Document {
    fn from(v: Vec<T>) -> Self {
        Document::Array(v.into_iter().map(Into::into).collect())
    }
}

impl FromIterator<(String, Document)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Document)>>(iter: I) -> Self {
        Document::Map(iter.into_iter().collect())
    }
}
