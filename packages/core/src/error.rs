//! Error types for the codec pipeline and the datastore layer.

use thiserror::Error;

/// Errors raised by the codec pipeline and propagated by the datastore layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A nested structure appeared where only a scalar primary key is allowed.
    #[error("non-primitive value in primary key position")]
    NonPrimitiveKey,

    /// A map key could not be decoded to the requested target type.
    #[error("unsupported map key `{key}` for target `{target}`")]
    UnsupportedKey { key: String, target: String },

    /// No constant in the target enumeration matched the encoded string.
    #[error("no constant matching `{constant}` in enumeration `{type_name}`")]
    EnumResolution { type_name: String, constant: String },

    /// A class tag named a type the registry could not resolve.
    ///
    /// Decode treats this as non-fatal and falls back to the statically
    /// expected type; it only surfaces from direct registry lookups.
    #[error("unknown class name `{0}`")]
    ClassResolution(String),

    /// A type the decode required has no registered codec.
    #[error("no codec registered for type `{0}`")]
    CodecMissing(String),

    /// A query result carried no value in the primary-key field.
    #[error("query result has no primary key in field `{0}`")]
    MissingPrimaryKey(String),

    /// The underlying table reported an I/O or query error.
    #[error("remote source failure: {0}")]
    Remote(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A value did not have the shape the codec expected.
    #[error("decode error: expected {expected}, found {found}")]
    Decode { expected: String, found: String },

    /// A find operation was cancelled before completion was delivered.
    #[error("operation cancelled")]
    Cancelled,

    /// An item outlived the datastore it belongs to.
    #[error("datastore has been dropped")]
    StoreDetached,

    /// A builder was finished with a required part missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error from a local table backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an arbitrary table-side failure.
    pub fn remote(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Remote(err.into())
    }

    /// Shorthand for a shape mismatch.
    pub fn decode(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::Decode {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Result type alias for codec and datastore operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let e = Error::UnsupportedKey {
            key: "x".into(),
            target: "f64".into(),
        };
        assert!(format!("{}", e).contains("`x`"));

        let e = Error::EnumResolution {
            type_name: "demo.Shape".into(),
            constant: "Hexagon".into(),
        };
        assert!(format!("{}", e).contains("demo.Shape"));
        assert!(format!("{}", e).contains("Hexagon"));
    }

    #[test]
    fn remote_wraps_source() {
        let e = Error::remote("connection reset");
        assert!(format!("{}", e).contains("connection reset"));
    }
}
