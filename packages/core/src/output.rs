//! Writing typed values into documents.
//!
//! The mirror of decoding: scalars pass through, string-keyed maps become
//! map nodes, maps with other key types flatten to lists of pairs with
//! stringified keys, and polymorphic values are tagged with `__class`.

use std::collections::BTreeMap;

use crate::codec::CodecContext;
use crate::document::{Document, CLASS_NAME_FIELD};
use crate::error::{Error, Result};
use crate::types::{DataValue, TypeDesc};

/// Serialize a map key to its string form.
///
/// Integers use decimal text; floating point uses the decimal text of the
/// IEEE-754 bit pattern reinterpreted as a signed 64-bit integer, which
/// preserves NaN bits and signed zero across the round trip.
pub fn key_to_string(key: &DataValue) -> Result<String> {
    match key {
        DataValue::String(s) => Ok(s.clone()),
        DataValue::Int(v) => Ok(v.to_string()),
        DataValue::Float(v) => Ok((v.to_bits() as i64).to_string()),
        other => Err(Error::UnsupportedKey {
            key: format!("{:?}", other),
            target: "string".into(),
        }),
    }
}

/// Encode a decoded value into a document, guided by the declared static
/// type of the slot being written.
///
/// A `None` context is only sufficient for values that contain no domain
/// objects; object encoding needs the registry to find codecs and tag
/// polymorphic values.
pub fn encode_value(
    ctx: Option<&CodecContext>,
    value: &DataValue,
    declared: &TypeDesc,
) -> Result<Document> {
    match value {
        DataValue::Null => Ok(Document::Null),
        DataValue::Bool(b) => Ok(Document::Bool(*b)),
        DataValue::Int(v) => Ok(match declared {
            TypeDesc::Int32 => Document::Int32(*v as i32),
            _ => Document::Int64(*v),
        }),
        DataValue::Float(v) => Ok(Document::Double(*v)),
        DataValue::String(s) => Ok(Document::String(s.clone())),
        DataValue::Bytes(b) => Ok(Document::Bytes(b.clone())),

        DataValue::List(items) => {
            let elem = match declared {
                TypeDesc::List(e) | TypeDesc::Array(e) => e.as_ref(),
                _ => &TypeDesc::Any,
            };
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(encode_value(ctx, item, elem)?);
            }
            Ok(Document::Array(out))
        }

        DataValue::Map(entries) => {
            let vtype = match declared {
                TypeDesc::Map(_, v) => v.as_ref(),
                _ => &TypeDesc::Any,
            };

            if entries.iter().all(|(k, _)| matches!(k, DataValue::String(_))) {
                let mut map = BTreeMap::new();
                for (k, v) in entries {
                    if let DataValue::String(key) = k {
                        map.insert(key.clone(), encode_value(ctx, v, vtype)?);
                    }
                }
                return Ok(Document::Map(map));
            }

            // non-string keys flatten to [[k, v], ...] with string keys
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                out.push(Document::Array(vec![
                    Document::String(key_to_string(k)?),
                    encode_value(ctx, v, vtype)?,
                ]));
            }
            Ok(Document::Array(out))
        }

        DataValue::Object(obj) => {
            let Some(ctx) = ctx else {
                return Err(Error::CodecMissing(obj.type_name().to_string()));
            };
            let entry = ctx
                .registry()
                .find_by_name(obj.type_name())
                .ok_or_else(|| Error::CodecMissing(obj.type_name().to_string()))?;

            let declared_name = match declared {
                TypeDesc::Named(name) => Some(name.as_str()),
                _ => None,
            };
            let tagged = entry.requires_class_tag() || declared_name != Some(obj.type_name());

            if let Some(en) = entry.as_enum() {
                let constant = en.constant_name(obj).ok_or_else(|| {
                    Error::decode(obj.type_name(), "unregistered enumeration constant")
                })?;
                let text = if tagged {
                    format!("{}:{}", obj.type_name(), constant)
                } else {
                    constant.to_string()
                };
                return Ok(Document::String(text));
            }

            let mut output = EncodeOutput::new();
            entry.encode_object(ctx, obj, &mut output)?;
            let mut document = output.finish();
            if tagged {
                if let Document::Map(map) = &mut document {
                    map.insert(
                        CLASS_NAME_FIELD.to_string(),
                        Document::String(obj.type_name().to_string()),
                    );
                }
            }
            Ok(document)
        }
    }
}

/// Writes typed fields by name into a document-in-progress.
///
/// The primary key lives in a dedicated slot so a table can redirect it
/// to an alternate field without the codec knowing; it is merged into the
/// final map node by [`EncodeOutput::finish`].
#[derive(Debug, Default)]
pub struct EncodeOutput {
    key: Option<(String, Document)>,
    fields: BTreeMap<String, Document>,
    key_field_override: Option<String>,
}

impl EncodeOutput {
    /// Create an empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an output whose primary key is stored under an alternate
    /// field name.
    pub fn with_key_field_override(key_field: impl Into<String>) -> Self {
        Self {
            key: None,
            fields: BTreeMap::new(),
            key_field_override: Some(key_field.into()),
        }
    }

    /// Set the primary-key slot.
    ///
    /// The key must encode to a scalar document.
    pub fn set_key(&mut self, ctx: &CodecContext, field: &str, key: &DataValue) -> Result<()> {
        let encoded = encode_value(Some(ctx), key, &TypeDesc::Any)?;
        if !encoded.is_scalar() {
            return Err(Error::NonPrimitiveKey);
        }
        let field = self
            .key_field_override
            .clone()
            .unwrap_or_else(|| field.to_string());
        self.key = Some((field, encoded));
        Ok(())
    }

    /// Write a field, encoding the value against its declared type.
    pub fn write(
        &mut self,
        ctx: &CodecContext,
        field: &str,
        value: &DataValue,
        declared: &TypeDesc,
    ) -> Result<()> {
        let encoded = encode_value(Some(ctx), value, declared)?;
        self.fields.insert(field.to_string(), encoded);
        Ok(())
    }

    /// The primary-key slot, if set.
    pub fn key(&self) -> Option<(&str, &Document)> {
        self.key.as_ref().map(|(f, d)| (f.as_str(), d))
    }

    /// Whether a field has been written.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Finish into a map document, key slot included.
    pub fn finish(self) -> Document {
        let mut map = self.fields;
        if let Some((field, key)) = self.key {
            map.insert(field, key);
        }
        Document::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{EnumCodec, ValueCodec};
    use crate::input::DecodeInput;
    use crate::registry::CodecRegistry;
    use crate::types::ObjectValue;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Shape {
        Circle,
        Square,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Color {
        Red,
        Blue,
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Pet {
        name: String,
    }

    struct PetCodec;

    impl ValueCodec<Pet> for PetCodec {
        fn type_name(&self) -> &str {
            "test.Pet"
        }

        fn construct(&self, _ctx: &CodecContext, _input: &dyn DecodeInput) -> Result<Pet> {
            Ok(Pet::default())
        }

        fn decode(
            &self,
            ctx: &CodecContext,
            value: &mut Pet,
            input: &dyn DecodeInput,
        ) -> Result<()> {
            value.name = input.read(ctx, "name", &TypeDesc::String)?.into_string()?;
            Ok(())
        }

        fn encode(
            &self,
            ctx: &CodecContext,
            value: &Pet,
            output: &mut EncodeOutput,
        ) -> Result<()> {
            output.write(
                ctx,
                "name",
                &DataValue::String(value.name.clone()),
                &TypeDesc::String,
            )
        }
    }

    fn context() -> CodecContext {
        let mut registry = CodecRegistry::new();
        registry.register(PetCodec);
        registry.register_enum(EnumCodec::new(
            "demo.Shape",
            [("Circle", Shape::Circle), ("Square", Shape::Square)],
        ));
        registry.register_enum(
            EnumCodec::new("demo.Color", [("Red", Color::Red), ("Blue", Color::Blue)]).tagged(),
        );
        CodecContext::new(Arc::new(registry))
    }

    #[test]
    fn scalars_pass_through() {
        let ctx = context();
        assert_eq!(
            encode_value(Some(&ctx), &DataValue::Int(5), &TypeDesc::Int64).unwrap(),
            Document::Int64(5)
        );
        assert_eq!(
            encode_value(Some(&ctx), &DataValue::Int(5), &TypeDesc::Int32).unwrap(),
            Document::Int32(5)
        );
        assert_eq!(
            encode_value(Some(&ctx), &DataValue::from("x"), &TypeDesc::String).unwrap(),
            Document::from("x")
        );
        assert_eq!(
            encode_value(Some(&ctx), &DataValue::Null, &TypeDesc::Any).unwrap(),
            Document::Null
        );
    }

    #[test]
    fn string_keyed_map_becomes_map_node() {
        let ctx = context();
        let map = DataValue::Map(vec![
            (DataValue::from("a"), DataValue::Int(6)),
            (DataValue::from("b"), DataValue::Int(7)),
        ]);

        let doc = encode_value(
            Some(&ctx),
            &map,
            &TypeDesc::map(TypeDesc::String, TypeDesc::Int64),
        )
        .unwrap();

        assert_eq!(doc.field("a"), Some(&Document::Int64(6)));
        assert_eq!(doc.field("b"), Some(&Document::Int64(7)));
    }

    #[test]
    fn int_keyed_map_flattens_to_pairs() {
        let ctx = context();
        let map = DataValue::Map(vec![(DataValue::Int(1), DataValue::Int(10))]);

        let doc = encode_value(
            Some(&ctx),
            &map,
            &TypeDesc::map(TypeDesc::Int32, TypeDesc::Int32),
        )
        .unwrap();

        assert_eq!(
            doc,
            Document::Array(vec![Document::Array(vec![
                Document::from("1"),
                Document::Int32(10),
            ])])
        );
    }

    #[test]
    fn float_keys_use_bit_pattern_text() {
        assert_eq!(
            key_to_string(&DataValue::Float(1.5)).unwrap(),
            "4609434218613702656"
        );
        // signed zero survives
        assert_ne!(
            key_to_string(&DataValue::Float(0.0)).unwrap(),
            key_to_string(&DataValue::Float(-0.0)).unwrap()
        );
    }

    #[test]
    fn unsupported_key_types_fail() {
        assert!(matches!(
            key_to_string(&DataValue::Bool(true)),
            Err(Error::UnsupportedKey { .. })
        ));
    }

    #[test]
    fn plain_enum_encodes_bare_constant() {
        let ctx = context();
        let value = DataValue::Object(ObjectValue::new("demo.Shape", Shape::Circle));

        let doc = encode_value(Some(&ctx), &value, &TypeDesc::named("demo.Shape")).unwrap();
        assert_eq!(doc, Document::from("Circle"));
    }

    #[test]
    fn tagged_enum_encodes_qualified_constant() {
        let ctx = context();
        let value = DataValue::Object(ObjectValue::new("demo.Color", Color::Red));

        let doc = encode_value(Some(&ctx), &value, &TypeDesc::named("demo.Color")).unwrap();
        assert_eq!(doc, Document::from("demo.Color:Red"));
    }

    #[test]
    fn enum_under_any_declaration_is_qualified() {
        let ctx = context();
        let value = DataValue::Object(ObjectValue::new("demo.Shape", Shape::Square));

        let doc = encode_value(Some(&ctx), &value, &TypeDesc::Any).unwrap();
        assert_eq!(doc, Document::from("demo.Shape:Square"));
    }

    #[test]
    fn object_under_matching_declaration_is_untagged() {
        let ctx = context();
        let value = DataValue::Object(ObjectValue::new("test.Pet", Pet { name: "Rex".into() }));

        let doc = encode_value(Some(&ctx), &value, &TypeDesc::named("test.Pet")).unwrap();
        assert_eq!(doc.field("name"), Some(&Document::from("Rex")));
        assert_eq!(doc.class_name(), None);
    }

    #[test]
    fn object_under_differing_declaration_gets_class_tag() {
        let ctx = context();
        let value = DataValue::Object(ObjectValue::new("test.Pet", Pet { name: "Rex".into() }));

        let doc = encode_value(Some(&ctx), &value, &TypeDesc::named("test.Animal")).unwrap();
        assert_eq!(doc.class_name(), Some("test.Pet"));
        assert_eq!(doc.field("name"), Some(&Document::from("Rex")));
    }

    #[test]
    fn object_without_context_fails() {
        let value = DataValue::Object(ObjectValue::new("demo.Shape", Shape::Circle));
        assert!(matches!(
            encode_value(None, &value, &TypeDesc::Any),
            Err(Error::CodecMissing(_))
        ));
    }

    #[test]
    fn key_slot_merges_on_finish() {
        let ctx = context();
        let mut output = EncodeOutput::new();
        output.set_key(&ctx, "id", &DataValue::Int(9)).unwrap();
        output
            .write(&ctx, "name", &DataValue::from("Alice"), &TypeDesc::String)
            .unwrap();

        assert_eq!(output.key(), Some(("id", &Document::Int64(9))));
        let doc = output.finish();
        assert_eq!(doc.field("id"), Some(&Document::Int64(9)));
        assert_eq!(doc.field("name"), Some(&Document::from("Alice")));
    }

    #[test]
    fn key_slot_honors_override() {
        let ctx = context();
        let mut output = EncodeOutput::with_key_field_override("_id");
        output.set_key(&ctx, "id", &DataValue::Int(9)).unwrap();

        let doc = output.finish();
        assert_eq!(doc.field("_id"), Some(&Document::Int64(9)));
        assert_eq!(doc.field("id"), None);
    }

    #[test]
    fn non_scalar_key_is_rejected() {
        let ctx = context();
        let mut output = EncodeOutput::new();
        let err = output
            .set_key(&ctx, "id", &DataValue::List(vec![DataValue::Int(1)]))
            .unwrap_err();
        assert!(matches!(err, Error::NonPrimitiveKey));
    }
}
