//! The codec registry: type-erased codec lookup by type or by name.
//!
//! The registry is built once at startup and then published read-only
//! behind an `Arc`; nothing mutates it afterwards.

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::codec::{CodecContext, EnumCodec, ValueCodec};
use crate::error::{Error, Result};
use crate::input::DecodeInput;
use crate::output::EncodeOutput;
use crate::types::{AnyObject, ObjectValue};

/// A registered codec with its value type erased.
///
/// This is what the decode pipeline works with when it resolves nested
/// objects: it can construct-and-decode a value of the codec's type and
/// hand it back as an [`ObjectValue`].
pub trait ErasedCodec: Send + Sync {
    /// The stable name this codec is registered under.
    fn type_name(&self) -> &str;

    /// The Rust type this codec produces.
    fn value_type(&self) -> TypeId;

    /// Whether encoded values always carry a `__class` tag.
    fn requires_class_tag(&self) -> bool;

    /// Run `construct` then `decode` against an input.
    fn construct_and_decode(
        &self,
        ctx: &CodecContext,
        input: &dyn DecodeInput,
    ) -> Result<ObjectValue>;

    /// Encode an erased value of this codec's type.
    fn encode_object(
        &self,
        ctx: &CodecContext,
        value: &ObjectValue,
        output: &mut EncodeOutput,
    ) -> Result<()>;

    /// Enumeration behavior, when this codec describes an enumeration.
    fn as_enum(&self) -> Option<&dyn ErasedEnumCodec> {
        None
    }
}

impl std::fmt::Debug for dyn ErasedCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedCodec")
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// Enumeration-specific lookup on an erased codec.
pub trait ErasedEnumCodec: Send + Sync {
    /// Resolve a constant by name, case-insensitively.
    fn resolve_constant(&self, name: &str) -> Option<ObjectValue>;

    /// The declared name of an erased constant value.
    fn constant_name(&self, value: &ObjectValue) -> Option<&str>;
}

struct ObjectEntry<T, C> {
    codec: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T: AnyObject, C: ValueCodec<T>> ErasedCodec for ObjectEntry<T, C> {
    fn type_name(&self) -> &str {
        self.codec.type_name()
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn requires_class_tag(&self) -> bool {
        self.codec.requires_class_tag()
    }

    fn construct_and_decode(
        &self,
        ctx: &CodecContext,
        input: &dyn DecodeInput,
    ) -> Result<ObjectValue> {
        let mut value = self.codec.construct(ctx, input)?;
        self.codec.decode(ctx, &mut value, input)?;
        Ok(ObjectValue::new(self.codec.type_name(), value))
    }

    fn encode_object(
        &self,
        ctx: &CodecContext,
        value: &ObjectValue,
        output: &mut EncodeOutput,
    ) -> Result<()> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| Error::decode(self.codec.type_name(), value.type_name()))?;
        self.codec.encode(ctx, value, output)
    }
}

struct EnumEntry<T> {
    codec: EnumCodec<T>,
}

impl<T: AnyObject + Clone + PartialEq> ErasedCodec for EnumEntry<T> {
    fn type_name(&self) -> &str {
        self.codec.type_name()
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn requires_class_tag(&self) -> bool {
        self.codec.requires_class_tag()
    }

    fn construct_and_decode(
        &self,
        _ctx: &CodecContext,
        _input: &dyn DecodeInput,
    ) -> Result<ObjectValue> {
        // enumerations travel as strings, never as document nodes
        Err(Error::decode(self.codec.type_name(), "document"))
    }

    fn encode_object(
        &self,
        _ctx: &CodecContext,
        value: &ObjectValue,
        _output: &mut EncodeOutput,
    ) -> Result<()> {
        Err(Error::decode("document", value.type_name()))
    }

    fn as_enum(&self) -> Option<&dyn ErasedEnumCodec> {
        Some(self)
    }
}

impl<T: AnyObject + Clone + PartialEq> ErasedEnumCodec for EnumEntry<T> {
    fn resolve_constant(&self, name: &str) -> Option<ObjectValue> {
        self.codec
            .resolve(name)
            .map(|v| ObjectValue::new(self.codec.type_name(), v.clone()))
    }

    fn constant_name(&self, value: &ObjectValue) -> Option<&str> {
        let value = value.downcast_ref::<T>()?;
        self.codec.name_of(value)
    }
}

/// Codec lookup by Rust type and by stable string name.
#[derive(Default)]
pub struct CodecRegistry {
    by_name: HashMap<String, Arc<dyn ErasedCodec>>,
    by_type: HashMap<TypeId, Arc<dyn ErasedCodec>>,
}

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec for an object type.
    ///
    /// A later registration for the same type or name replaces the
    /// earlier one.
    pub fn register<T: AnyObject, C: ValueCodec<T>>(&mut self, codec: C) {
        let entry: Arc<dyn ErasedCodec> = Arc::new(ObjectEntry {
            codec,
            _marker: PhantomData::<fn() -> T>,
        });
        self.insert(entry);
    }

    /// Register an enumeration codec.
    pub fn register_enum<T: AnyObject + Clone + PartialEq>(&mut self, codec: EnumCodec<T>) {
        let entry: Arc<dyn ErasedCodec> = Arc::new(EnumEntry { codec });
        self.insert(entry);
    }

    fn insert(&mut self, entry: Arc<dyn ErasedCodec>) {
        self.by_name
            .insert(entry.type_name().to_string(), entry.clone());
        self.by_type.insert(entry.value_type(), entry);
    }

    /// Find the codec registered for a Rust type.
    pub fn find<T: 'static>(&self) -> Option<Arc<dyn ErasedCodec>> {
        self.by_type.get(&TypeId::of::<T>()).cloned()
    }

    /// Find a codec by its stable name.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<dyn ErasedCodec>> {
        self.by_name.get(name).cloned()
    }

    /// Resolve a class tag to its codec, failing with `ClassResolution`
    /// when the name is unknown.
    pub fn resolve_class(&self, name: &str) -> Result<Arc<dyn ErasedCodec>> {
        self.find_by_name(name)
            .ok_or_else(|| Error::ClassResolution(name.to_string()))
    }

    /// Number of registered codecs.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the registry has no codecs.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EnumCodec;
    use crate::types::{DataValue, TypeDesc};

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

    #[derive(Debug, Clone, PartialEq)]
    enum Rank {
        Gold,
        Silver,
    }

    #[test]
    fn register_and_find_by_type_and_name() {
        let mut registry = CodecRegistry::new();
        registry.register(PetCodec);

        assert_eq!(registry.len(), 1);
        assert!(registry.find::<Pet>().is_some());
        assert!(registry.find_by_name("test.Pet").is_some());
        assert!(registry.find::<String>().is_none());
        assert!(registry.find_by_name("test.Unknown").is_none());
    }

    #[test]
    fn resolve_class_reports_unknown_names() {
        let registry = CodecRegistry::new();
        let err = registry.resolve_class("test.Ghost").unwrap_err();
        assert!(matches!(err, Error::ClassResolution(name) if name == "test.Ghost"));
    }

    #[test]
    fn enum_entry_resolves_constants() {
        let mut registry = CodecRegistry::new();
        registry.register_enum(EnumCodec::new(
            "test.Rank",
            [("Gold", Rank::Gold), ("Silver", Rank::Silver)],
        ));

        let entry = registry.find_by_name("test.Rank").unwrap();
        let en = entry.as_enum().unwrap();

        let gold = en.resolve_constant("gold").unwrap();
        assert_eq!(gold.downcast_ref::<Rank>(), Some(&Rank::Gold));
        assert!(en.resolve_constant("Bronze").is_none());
        assert_eq!(en.constant_name(&gold), Some("Gold"));
    }

    #[test]
    fn later_registration_replaces() {
        let mut registry = CodecRegistry::new();
        registry.register(PetCodec);
        registry.register(PetCodec);
        assert_eq!(registry.len(), 1);
    }
}
