//! Type descriptors and dynamic decoded values.
//!
//! Decode and encode are type-directed: instead of reflecting over the
//! target, callers pass an explicit `TypeDesc` describing what a field
//! should decode to. The pipeline produces `DataValue`s - a dynamic
//! representation rich enough to hold scalars, containers with arbitrary
//! key types, and type-erased domain objects.

use std::any::Any;
use std::fmt;

use crate::document::Document;
use crate::error::{Error, Result};

/// Describes the declared target type of a decode, or the declared static
/// type of an encode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDesc {
    /// No expectation; the value decodes structurally.
    Any,
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bytes,
    /// A growable sequence with the given element type.
    List(Box<TypeDesc>),
    /// A fixed-length sequence with the given element type.
    Array(Box<TypeDesc>),
    /// A map with the given key and value types.
    Map(Box<TypeDesc>, Box<TypeDesc>),
    /// A registered object or enumeration type, by its stable name.
    Named(String),
}

impl TypeDesc {
    /// A list of `elem`.
    pub fn list(elem: TypeDesc) -> Self {
        TypeDesc::List(Box::new(elem))
    }

    /// An array of `elem`.
    pub fn array(elem: TypeDesc) -> Self {
        TypeDesc::Array(Box::new(elem))
    }

    /// A map from `key` to `value`.
    pub fn map(key: TypeDesc, value: TypeDesc) -> Self {
        TypeDesc::Map(Box::new(key), Box::new(value))
    }

    /// A registered type, by name.
    pub fn named(name: impl Into<String>) -> Self {
        TypeDesc::Named(name.into())
    }

    /// Whether this target takes part in numeric coercion.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeDesc::Int32 | TypeDesc::Int64 | TypeDesc::Float32 | TypeDesc::Float64
        )
    }

    /// Short human-readable name used in error messages.
    pub fn name(&self) -> String {
        match self {
            TypeDesc::Any => "any".into(),
            TypeDesc::Bool => "bool".into(),
            TypeDesc::Int32 => "i32".into(),
            TypeDesc::Int64 => "i64".into(),
            TypeDesc::Float32 => "f32".into(),
            TypeDesc::Float64 => "f64".into(),
            TypeDesc::String => "string".into(),
            TypeDesc::Bytes => "bytes".into(),
            TypeDesc::List(e) => format!("list<{}>", e.name()),
            TypeDesc::Array(e) => format!("array<{}>", e.name()),
            TypeDesc::Map(k, v) => format!("map<{}, {}>", k.name(), v.name()),
            TypeDesc::Named(n) => n.clone(),
        }
    }
}

/// A type-erased domain value.
///
/// Implemented automatically for every `'static` type that is `Debug`,
/// `Clone`, `PartialEq`, `Send` and `Sync`; codecs never implement this
/// by hand.
pub trait AnyObject: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn clone_object(&self) -> Box<dyn AnyObject>;
    fn object_eq(&self, other: &dyn AnyObject) -> bool;
}

impl<T> AnyObject for T
where
    T: Any + fmt::Debug + Clone + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_object(&self) -> Box<dyn AnyObject> {
        Box::new(self.clone())
    }

    fn object_eq(&self, other: &dyn AnyObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |o| self == o)
    }
}

/// A decoded domain object together with its registered type name.
///
/// The name is the identity used for codec lookup and `__class` tagging;
/// equality is structural on both the name and the erased value.
#[derive(Debug)]
pub struct ObjectValue {
    type_name: String,
    value: Box<dyn AnyObject>,
}

impl ObjectValue {
    /// Wrap a domain value under its registered type name.
    pub fn new<T: AnyObject>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            value: Box::new(value),
        }
    }

    /// The registered type name of the wrapped value.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Borrow the wrapped value as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_any().downcast_ref::<T>()
    }

    /// Take the wrapped value out as a concrete type.
    ///
    /// Returns `self` unchanged when the type does not match.
    pub fn into_inner<T: Any>(self) -> std::result::Result<T, ObjectValue> {
        if !self.value.as_any().is::<T>() {
            return Err(self);
        }
        match self.value.into_any().downcast::<T>() {
            Ok(boxed) => Ok(*boxed),
            // unreachable: the is::<T> check above already matched
            Err(_) => unreachable!("downcast after type check"),
        }
    }
}

impl Clone for ObjectValue {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name.clone(),
            value: self.value.clone_object(),
        }
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.value.object_eq(&*other.value)
    }
}

/// A dynamically-typed decoded value.
#[derive(Clone, Debug, PartialEq)]
pub enum DataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<DataValue>),
    /// Entries as key/value pairs; keys may be of any scalar type.
    Map(Vec<(DataValue, DataValue)>),
    /// A decoded domain object or enumeration constant.
    Object(ObjectValue),
}

impl DataValue {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Bool(_) => "bool",
            DataValue::Int(_) => "int",
            DataValue::Float(_) => "float",
            DataValue::String(_) => "string",
            DataValue::Bytes(_) => "bytes",
            DataValue::List(_) => "list",
            DataValue::Map(_) => "map",
            DataValue::Object(_) => "object",
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Convert to a boolean; integers bridge through `0 == false`.
    pub fn to_bool(&self) -> Result<bool> {
        match self {
            DataValue::Bool(b) => Ok(*b),
            DataValue::Int(v) => Ok(*v != 0),
            other => Err(Error::decode("bool", other.kind())),
        }
    }

    /// Convert to a signed 64-bit integer; floats truncate, booleans
    /// bridge through `false == 0`.
    pub fn to_i64(&self) -> Result<i64> {
        match self {
            DataValue::Int(v) => Ok(*v),
            DataValue::Float(v) => Ok(*v as i64),
            DataValue::Bool(b) => Ok(i64::from(*b)),
            other => Err(Error::decode("i64", other.kind())),
        }
    }

    /// Convert to a signed 32-bit integer; lossy narrowing truncates.
    pub fn to_i32(&self) -> Result<i32> {
        Ok(self.to_i64()? as i32)
    }

    /// Convert to a 64-bit float; integers widen.
    pub fn to_f64(&self) -> Result<f64> {
        match self {
            DataValue::Float(v) => Ok(*v),
            DataValue::Int(v) => Ok(*v as f64),
            other => Err(Error::decode("f64", other.kind())),
        }
    }

    /// Convert to a 32-bit float.
    pub fn to_f32(&self) -> Result<f32> {
        Ok(self.to_f64()? as f32)
    }

    /// Take this value as a string.
    pub fn into_string(self) -> Result<String> {
        match self {
            DataValue::String(s) => Ok(s),
            other => Err(Error::decode("string", other.kind())),
        }
    }

    /// Take this value as binary data.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            DataValue::Bytes(b) => Ok(b),
            other => Err(Error::decode("bytes", other.kind())),
        }
    }

    /// Take this value as a list of elements.
    pub fn into_list(self) -> Result<Vec<DataValue>> {
        match self {
            DataValue::List(items) => Ok(items),
            other => Err(Error::decode("list", other.kind())),
        }
    }

    /// Take this value as map entries.
    pub fn into_map(self) -> Result<Vec<(DataValue, DataValue)>> {
        match self {
            DataValue::Map(entries) => Ok(entries),
            other => Err(Error::decode("map", other.kind())),
        }
    }

    /// Take this value as a concrete domain type.
    pub fn downcast<T: Any>(self) -> Result<T> {
        match self {
            DataValue::Object(obj) => {
                let name = obj.type_name().to_string();
                obj.into_inner::<T>()
                    .map_err(|_| Error::decode(std::any::type_name::<T>(), name))
            }
            other => Err(Error::decode(std::any::type_name::<T>(), other.kind())),
        }
    }

    /// Look up a map entry by key.
    pub fn map_get(&self, key: &DataValue) -> Option<&DataValue> {
        match self {
            DataValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Convert a document tree structurally, without consulting any codec.
    ///
    /// Map nodes keep their string keys; no `__class` resolution happens.
    pub fn from_document(doc: &Document) -> DataValue {
        match doc {
            Document::Null => DataValue::Null,
            Document::Bool(b) => DataValue::Bool(*b),
            Document::Int32(v) => DataValue::Int(i64::from(*v)),
            Document::Int64(v) => DataValue::Int(*v),
            Document::Double(v) => DataValue::Float(*v),
            Document::String(s) => DataValue::String(s.clone()),
            Document::Bytes(b) => DataValue::Bytes(b.clone()),
            Document::Array(items) => {
                DataValue::List(items.iter().map(DataValue::from_document).collect())
            }
            Document::Map(map) => DataValue::Map(
                map.iter()
                    .map(|(k, v)| (DataValue::String(k.clone()), DataValue::from_document(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        DataValue::Bool(v)
    }
}

impl From<i32> for DataValue {
    fn from(v: i32) -> Self {
        DataValue::Int(i64::from(v))
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::Int(v)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Float(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::String(v.to_string())
    }
}

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pet {
        name: String,
    }

    #[test]
    fn object_value_roundtrip() {
        let obj = ObjectValue::new(
            "test.Pet",
            Pet {
                name: "Rex".into(),
            },
        );
        assert_eq!(obj.type_name(), "test.Pet");
        assert_eq!(obj.downcast_ref::<Pet>().unwrap().name, "Rex");

        let pet: Pet = obj.into_inner().unwrap();
        assert_eq!(pet.name, "Rex");
    }

    #[test]
    fn object_value_wrong_type() {
        let obj = ObjectValue::new("test.Pet", Pet { name: "Rex".into() });
        assert!(obj.downcast_ref::<String>().is_none());
        assert!(obj.into_inner::<String>().is_err());
    }

    #[test]
    fn object_value_equality() {
        let a = ObjectValue::new("test.Pet", Pet { name: "Rex".into() });
        let b = ObjectValue::new("test.Pet", Pet { name: "Rex".into() });
        let c = ObjectValue::new("test.Pet", Pet { name: "Roy".into() });
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn object_value_clone_preserves_value() {
        let a = ObjectValue::new("test.Pet", Pet { name: "Rex".into() });
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn data_value_downcast() {
        let v = DataValue::Object(ObjectValue::new("test.Pet", Pet { name: "Rex".into() }));
        let pet: Pet = v.downcast().unwrap();
        assert_eq!(pet.name, "Rex");

        assert!(DataValue::Int(3).downcast::<Pet>().is_err());
    }

    #[test]
    fn numeric_conversions() {
        assert_eq!(DataValue::Int(300).to_i32().unwrap(), 300);
        assert_eq!(DataValue::Float(2.9).to_i64().unwrap(), 2);
        assert_eq!(DataValue::Int(2).to_f64().unwrap(), 2.0);
        assert_eq!(DataValue::Bool(true).to_i64().unwrap(), 1);
        assert_eq!(DataValue::Int(0).to_bool().unwrap(), false);
        assert_eq!(DataValue::Int(-5).to_bool().unwrap(), true);
        assert!(DataValue::String("1".into()).to_i64().is_err());
    }

    #[test]
    fn narrowing_truncates() {
        let wide = DataValue::Int(i64::from(i32::MAX) + 10);
        assert_eq!(wide.to_i32().unwrap(), (i64::from(i32::MAX) + 10) as i32);
    }

    #[test]
    fn map_get_finds_entries() {
        let map = DataValue::Map(vec![
            (DataValue::Int(1), DataValue::from("a")),
            (DataValue::Int(2), DataValue::from("b")),
        ]);
        assert_eq!(map.map_get(&DataValue::Int(2)), Some(&DataValue::from("b")));
        assert_eq!(map.map_get(&DataValue::Int(9)), None);
    }

    #[test]
    fn from_document_structural() {
        let doc: Document = [
            ("n".to_string(), Document::from(1i32)),
            ("items".to_string(), Document::from(vec![1i64, 2])),
        ]
        .into_iter()
        .collect();

        let value = DataValue::from_document(&doc);
        assert_eq!(
            value.map_get(&DataValue::from("n")),
            Some(&DataValue::Int(1))
        );
        assert_eq!(
            value.map_get(&DataValue::from("items")),
            Some(&DataValue::List(vec![DataValue::Int(1), DataValue::Int(2)]))
        );
    }

    #[test]
    fn type_desc_names() {
        assert_eq!(TypeDesc::list(TypeDesc::Int32).name(), "list<i32>");
        assert_eq!(
            TypeDesc::map(TypeDesc::String, TypeDesc::Any).name(),
            "map<string, any>"
        );
        assert_eq!(TypeDesc::named("demo.Shape").name(), "demo.Shape");
        assert!(TypeDesc::Float32.is_numeric());
        assert!(!TypeDesc::String.is_numeric());
    }
}
