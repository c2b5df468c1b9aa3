//! docmap: typed, cached object-mapping over document tables.
//!
//! This facade re-exports the whole public surface:
//!
//! - `docmap-core`: document model, type descriptors, codecs, queries
//! - `docmap-datastore`: items, caches, datastores, find statuses
//! - `docmap-json-table`: in-memory and on-disk JSON table backends
//!
//! Depend on this crate to get everything, or on the member crates
//! individually to keep the dependency surface narrow.

pub use docmap_core::{
    document_to_json, encode_value, json_to_document, key_to_string, AnyObject, CodecContext,
    CodecRegistry, ConstraintOp, DataCodec, DataKey, DataValue, DecodeInput, Document,
    DocumentInput, EncodeOutput, EnumCodec, ErasedCodec, ErasedEnumCodec, Error, FieldConstraint,
    ObjectValue, Predicate, Query, Result, TypeDesc, ValueCodec, CLASS_NAME_FIELD,
};

pub use docmap_datastore::{
    DataCache, DataItem, DataManager, DataTable, Datastore, DatastoreBuilder, FindAllOutcome,
    FindAllStatus, FindOutcome, FindStatus,
};

pub use docmap_json_table::{JsonFileTable, MemoryTable};
