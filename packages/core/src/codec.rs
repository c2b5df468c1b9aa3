//! Codec traits: per-type translation between domain values and documents.
//!
//! A codec splits decoding in two: `construct` allocates a bare value,
//! reading only what is needed to pick the concrete type, and `decode`
//! fills its fields afterwards. The split lets polymorphic values resolve
//! their codec from a `__class` tag before any field is touched.

use std::sync::Arc;

use crate::error::Result;
use crate::input::DecodeInput;
use crate::output::EncodeOutput;
use crate::query::Query;
use crate::registry::CodecRegistry;

/// Per-operation scratch carrying the codec registry.
///
/// A context lives for one encode or decode invocation tree; it is cheap
/// to create and clone.
#[derive(Clone)]
pub struct CodecContext {
    registry: Arc<CodecRegistry>,
}

impl CodecContext {
    /// Create a context over a registry.
    pub fn new(registry: Arc<CodecRegistry>) -> Self {
        Self { registry }
    }

    /// The registry codecs are resolved from.
    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }
}

/// A compiled query predicate over decoded values.
pub type Predicate<'a, T> = Box<dyn Fn(&T) -> bool + Send + Sync + 'a>;

/// Translation between values of one type and document fields.
pub trait ValueCodec<T>: Send + Sync + 'static {
    /// The stable name this type is registered and tagged under.
    fn type_name(&self) -> &str;

    /// Allocate a bare value, reading only what is needed to choose a
    /// concrete type.
    fn construct(&self, ctx: &CodecContext, input: &dyn DecodeInput) -> Result<T>;

    /// Populate fields on an already-constructed value.
    fn decode(&self, ctx: &CodecContext, value: &mut T, input: &dyn DecodeInput) -> Result<()>;

    /// Emit fields of a value to an output.
    fn encode(&self, ctx: &CodecContext, value: &T, output: &mut EncodeOutput) -> Result<()>;

    /// Whether encoded values always carry a `__class` tag, even when the
    /// declared static type matches.
    fn requires_class_tag(&self) -> bool {
        false
    }
}

/// The root codec of a datastore: a `ValueCodec` that also knows the
/// primary-key field, default values, and query compilation.
pub trait DataCodec<K, T>: ValueCodec<T> {
    /// The document field the primary key is stored under.
    fn primary_key_field(&self) -> &str;

    /// Value for a freshly materialized item.
    fn create_default(&self, key: &K) -> T;

    /// Compile a query's field constraints into a value predicate used by
    /// cache scans.
    ///
    /// The default implementation encodes the candidate value and checks
    /// each constraint against the resulting document's fields.
    fn query_comparator<'a>(&'a self, ctx: CodecContext, query: &Query) -> Predicate<'a, T> {
        let constraints = query.constraints().to_vec();
        Box::new(move |value: &T| {
            let mut output = EncodeOutput::new();
            if self.encode(&ctx, value, &mut output).is_err() {
                return false;
            }
            let document = output.finish();
            constraints.iter().all(|c| c.matches_document(&document))
        })
    }
}

/// A declarative codec for enumeration types.
///
/// Constants are matched case-insensitively on decode; `tagged()` marks
/// the enumeration as always writing a `"<name>:<CONST>"` class-qualified
/// string, which polymorphic declarations need to find their way back.
pub struct EnumCodec<T> {
    type_name: String,
    constants: Vec<(&'static str, T)>,
    requires_class_tag: bool,
}

impl<T: Clone + PartialEq> EnumCodec<T> {
    /// Create an enumeration codec from a constant table.
    pub fn new(
        type_name: impl Into<String>,
        constants: impl IntoIterator<Item = (&'static str, T)>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            constants: constants.into_iter().collect(),
            requires_class_tag: false,
        }
    }

    /// Mark this enumeration as always writing class-qualified constants.
    pub fn tagged(mut self) -> Self {
        self.requires_class_tag = true;
        self
    }

    /// The registered name of the enumeration.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether constants are written class-qualified.
    pub fn requires_class_tag(&self) -> bool {
        self.requires_class_tag
    }

    /// Resolve a constant by name, case-insensitively.
    pub fn resolve(&self, name: &str) -> Option<&T> {
        self.constants
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// The declared name of a constant value.
    pub fn name_of(&self, value: &T) -> Option<&'static str> {
        self.constants
            .iter()
            .find(|(_, v)| v == value)
            .map(|(n, _)| *n)
    }
}
