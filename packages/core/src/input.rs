//! Reading typed values out of documents.
//!
//! Decoding is a type-directed dispatch over the input shape and the
//! declared target. The order of the rules matters: document encodings
//! flatten some structures (maps with non-string keys arrive as lists of
//! pairs), so lists are examined before scalar identity, and class tags
//! are resolved before the statically expected type is consulted.

use tracing::debug;

use crate::codec::CodecContext;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::registry::ErasedCodec;
use crate::types::{DataValue, TypeDesc};

use std::sync::Arc;

const NULL: &Document = &Document::Null;

/// Reads typed fields by name out of a document.
pub trait DecodeInput: Send + Sync {
    /// Read a field, decoding it against the expected target type.
    fn read(&self, ctx: &CodecContext, field: &str, expected: &TypeDesc) -> Result<DataValue>;

    /// Read the primary-key field without a codec context.
    ///
    /// Accepts scalar values only; nested structures fail with
    /// `NonPrimitiveKey`. A missing field reads as `DataValue::Null`.
    fn read_key(&self, field: &str, expected: &TypeDesc) -> Result<DataValue>;

    /// Whether a field is present at all.
    fn has_field(&self, field: &str) -> bool;
}

/// A [`DecodeInput`] over a document tree.
#[derive(Clone, Debug)]
pub struct DocumentInput {
    document: Document,
    key_field_override: Option<String>,
}

impl DocumentInput {
    /// Wrap a document for decoding.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            key_field_override: None,
        }
    }

    /// Wrap a document, reading the primary key from an alternate field.
    pub fn with_key_field_override(document: Document, key_field: impl Into<String>) -> Self {
        Self {
            document,
            key_field_override: Some(key_field.into()),
        }
    }

    /// The wrapped document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Unwrap into the document.
    pub fn into_document(self) -> Document {
        self.document
    }

    fn sub_input(&self, document: &Document) -> DocumentInput {
        DocumentInput {
            document: document.clone(),
            key_field_override: self.key_field_override.clone(),
        }
    }

    /// Decode a single document value against a declared target type.
    ///
    /// A `None` context marks the primary-key path, where only scalars
    /// are admissible.
    pub fn decode_value(
        &self,
        ctx: Option<&CodecContext>,
        value: &Document,
        expected: &TypeDesc,
    ) -> Result<DataValue> {
        match value {
            Document::Null => Ok(match expected {
                TypeDesc::List(_) | TypeDesc::Array(_) => DataValue::List(Vec::new()),
                TypeDesc::Map(_, _) => DataValue::Map(Vec::new()),
                _ => DataValue::Null,
            }),

            // lists come before scalar identity: maps with non-string
            // keys are flattened to lists of pairs on the wire
            Document::Array(items) => match expected {
                TypeDesc::Map(ktype, vtype) => self.decode_pair_list(ctx, items, ktype, vtype),
                TypeDesc::Array(elem) | TypeDesc::List(elem) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.decode_value(ctx, item, elem)?);
                    }
                    Ok(DataValue::List(out))
                }
                _ => {
                    if ctx.is_none() {
                        return Err(Error::NonPrimitiveKey);
                    }
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.decode_value(ctx, item, &TypeDesc::Any)?);
                    }
                    Ok(DataValue::List(out))
                }
            },

            Document::Map(map) => {
                let Some(ctx) = ctx else {
                    return Err(Error::NonPrimitiveKey);
                };

                if let TypeDesc::Map(ktype, vtype) = expected {
                    let mut entries = Vec::with_capacity(map.len());
                    for (k, v) in map {
                        entries.push((
                            self.decode_map_key(k, ktype)?,
                            self.decode_value(Some(ctx), v, vtype)?,
                        ));
                    }
                    return Ok(DataValue::Map(entries));
                }

                if let Some(class_name) = value.class_name() {
                    match ctx.registry().resolve_class(class_name) {
                        Ok(entry) => {
                            let input = self.sub_input(value);
                            return entry
                                .construct_and_decode(ctx, &input)
                                .map(DataValue::Object);
                        }
                        Err(_) => {
                            debug!(class = class_name, "unresolved class tag, decoding as declared type");
                        }
                    }
                }

                match expected {
                    TypeDesc::Named(name) => {
                        let entry = ctx
                            .registry()
                            .find_by_name(name)
                            .ok_or_else(|| Error::CodecMissing(name.clone()))?;
                        let input = self.sub_input(value);
                        entry.construct_and_decode(ctx, &input).map(DataValue::Object)
                    }
                    TypeDesc::Any => Ok(DataValue::from_document(value)),
                    other => Err(Error::CodecMissing(other.name())),
                }
            }

            scalar => {
                if matches!(expected, TypeDesc::Any) {
                    return Ok(DataValue::from_document(scalar));
                }

                if let (Document::String(s), TypeDesc::Named(name)) = (scalar, expected) {
                    if let Some(ctx) = ctx {
                        if let Some(entry) = ctx.registry().find_by_name(name) {
                            if entry.as_enum().is_some() {
                                return self.decode_enum_string(ctx, s, Some(&entry));
                            }
                            if entry.requires_class_tag() && s.contains(':') {
                                return self.decode_enum_string(ctx, s, None);
                            }
                        }
                    }
                }

                self.coerce_scalar(scalar, expected)
            }
        }
    }

    fn decode_pair_list(
        &self,
        ctx: Option<&CodecContext>,
        items: &[Document],
        ktype: &TypeDesc,
        vtype: &TypeDesc,
    ) -> Result<DataValue> {
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let pair = item
                .as_array()
                .ok_or_else(|| Error::decode("key/value pair", item.kind()))?;
            let [key, value] = pair else {
                return Err(Error::decode("key/value pair", "entry with wrong arity"));
            };

            // wire keys are strings; route them through key conversion
            // unless the declared key type keeps them textual
            let key = match (key, ktype) {
                (Document::String(s), t) if !matches!(t, TypeDesc::String | TypeDesc::Any) => {
                    self.decode_map_key(s, t)?
                }
                (k, t) => self.decode_value(ctx, k, t)?,
            };

            entries.push((key, self.decode_value(ctx, value, vtype)?));
        }
        Ok(DataValue::Map(entries))
    }

    /// Decode a stringified map key against a declared key type.
    ///
    /// Floating-point keys travel as the decimal text of their IEEE-754
    /// bit pattern reinterpreted as a signed 64-bit integer, so exact
    /// bits (NaN payloads, signed zero) survive the round trip.
    fn decode_map_key(&self, key: &str, expected: &TypeDesc) -> Result<DataValue> {
        let unsupported = || Error::UnsupportedKey {
            key: key.to_string(),
            target: expected.name(),
        };

        match expected {
            TypeDesc::String | TypeDesc::Any => Ok(DataValue::String(key.to_string())),
            TypeDesc::Float64 => {
                let bits: i64 = key.parse().map_err(|_| unsupported())?;
                Ok(DataValue::Float(f64::from_bits(bits as u64)))
            }
            TypeDesc::Float32 => {
                let bits: i64 = key.parse().map_err(|_| unsupported())?;
                Ok(DataValue::Float(f64::from(f64::from_bits(bits as u64) as f32)))
            }
            TypeDesc::Int64 => key
                .parse::<i64>()
                .map(DataValue::Int)
                .map_err(|_| unsupported()),
            TypeDesc::Int32 => key
                .parse::<i64>()
                .map(|v| DataValue::Int(i64::from(v as i32)))
                .map_err(|_| unsupported()),
            _ => Err(unsupported()),
        }
    }

    /// Decode an enumeration constant, optionally class-qualified as
    /// `"<name>:<CONST>"`.
    ///
    /// An unresolvable class half falls back to the declared enumeration;
    /// an unresolvable constant is an error.
    fn decode_enum_string(
        &self,
        ctx: &CodecContext,
        raw: &str,
        declared: Option<&Arc<dyn ErasedCodec>>,
    ) -> Result<DataValue> {
        let (class_part, constant) = match raw.split_once(':') {
            Some((class_name, constant)) => (Some(class_name), constant),
            None => (None, raw),
        };

        if let Some(class_name) = class_part {
            match ctx.registry().resolve_class(class_name) {
                Ok(entry) => {
                    if let Some(en) = entry.as_enum() {
                        return en
                            .resolve_constant(constant)
                            .map(DataValue::Object)
                            .ok_or_else(|| Error::EnumResolution {
                                type_name: entry.type_name().to_string(),
                                constant: constant.to_string(),
                            });
                    }
                    debug!(class = class_name, "class-qualified constant does not name an enumeration");
                }
                Err(_) => {
                    debug!(class = class_name, "unresolved enumeration class, falling back to declared type");
                }
            }
        }

        match declared.and_then(|entry| entry.as_enum()) {
            Some(en) => en
                .resolve_constant(constant)
                .map(DataValue::Object)
                .ok_or_else(|| Error::EnumResolution {
                    type_name: declared
                        .map(|entry| entry.type_name().to_string())
                        .unwrap_or_default(),
                    constant: constant.to_string(),
                }),
            None => Err(Error::EnumResolution {
                type_name: class_part.unwrap_or("?").to_string(),
                constant: constant.to_string(),
            }),
        }
    }

    /// Numeric cast table: narrowing truncates, booleans bridge through
    /// `0 == false`. Non-numeric targets pass the value through.
    fn coerce_scalar(&self, value: &Document, expected: &TypeDesc) -> Result<DataValue> {
        let mismatch = || Error::decode(expected.name(), value.kind());

        match expected {
            TypeDesc::Int32 => match value {
                Document::Int32(v) => Ok(DataValue::Int(i64::from(*v))),
                Document::Int64(v) => Ok(DataValue::Int(i64::from(*v as i32))),
                Document::Double(v) => Ok(DataValue::Int(i64::from(*v as i32))),
                Document::Bool(b) => Ok(DataValue::Int(i64::from(*b))),
                _ => Err(mismatch()),
            },
            TypeDesc::Int64 => match value {
                Document::Int32(v) => Ok(DataValue::Int(i64::from(*v))),
                Document::Int64(v) => Ok(DataValue::Int(*v)),
                Document::Double(v) => Ok(DataValue::Int(*v as i64)),
                Document::Bool(b) => Ok(DataValue::Int(i64::from(*b))),
                _ => Err(mismatch()),
            },
            TypeDesc::Float32 => match value {
                Document::Int32(v) => Ok(DataValue::Float(f64::from(*v as f32))),
                Document::Int64(v) => Ok(DataValue::Float(f64::from(*v as f32))),
                Document::Double(v) => Ok(DataValue::Float(f64::from(*v as f32))),
                _ => Err(mismatch()),
            },
            TypeDesc::Float64 => match value {
                Document::Int32(v) => Ok(DataValue::Float(f64::from(*v))),
                Document::Int64(v) => Ok(DataValue::Float(*v as f64)),
                Document::Double(v) => Ok(DataValue::Float(*v)),
                _ => Err(mismatch()),
            },
            TypeDesc::Bool => match value {
                Document::Bool(b) => Ok(DataValue::Bool(*b)),
                Document::Int32(v) => Ok(DataValue::Bool(*v != 0)),
                Document::Int64(v) => Ok(DataValue::Bool(*v != 0)),
                _ => Err(mismatch()),
            },
            _ => Ok(DataValue::from_document(value)),
        }
    }
}

impl DecodeInput for DocumentInput {
    fn read(&self, ctx: &CodecContext, field: &str, expected: &TypeDesc) -> Result<DataValue> {
        let value = self.document.field(field).unwrap_or(NULL);
        self.decode_value(Some(ctx), value, expected)
    }

    fn read_key(&self, field: &str, expected: &TypeDesc) -> Result<DataValue> {
        let field = self.key_field_override.as_deref().unwrap_or(field);
        match self.document.field(field) {
            Some(Document::Array(_)) | Some(Document::Map(_)) => Err(Error::NonPrimitiveKey),
            Some(value) => self.decode_value(None, value, expected),
            None => Ok(DataValue::Null),
        }
    }

    fn has_field(&self, field: &str) -> bool {
        self.document.field(field).is_some()
    }
}
