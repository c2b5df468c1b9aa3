//! Core docmap: the document model and the codec pipeline.
//!
//! This crate defines everything the datastore layer needs to translate
//! between typed domain values and self-describing document trees:
//!
//! - `Document`: the untyped recursive tree exchanged with storage
//! - `DataValue` / `TypeDesc`: dynamic decoded values and explicit target types
//! - `ValueCodec` / `DataCodec`: per-type translation, registered in a `CodecRegistry`
//! - `DocumentInput` / `EncodeOutput`: field-level decode and encode I/O
//! - `Query`: an optional primary key plus a conjunction of field constraints
//!
//! The storage side of the seam (tables, caching, items) lives in
//! `docmap-datastore`; this crate has no I/O of its own.
//!
//! # Example
//!
//! ```rust,ignore
//! use docmap_core::{CodecContext, CodecRegistry, DocumentInput, TypeDesc};
//!
//! let registry = std::sync::Arc::new(registry);
//! let ctx = CodecContext::new(registry.clone());
//! let input = DocumentInput::new(document);
//! let name = input.read(&ctx, "name", &TypeDesc::String)?.into_string()?;
//! ```

mod codec;
mod convert;
mod document;
mod error;
mod input;
mod key;
mod output;
mod query;
mod registry;
mod types;

pub use codec::{CodecContext, DataCodec, EnumCodec, Predicate, ValueCodec};
pub use convert::{document_to_json, json_to_document};
pub use document::{Document, CLASS_NAME_FIELD};
pub use error::{Error, Result};
pub use input::{DecodeInput, DocumentInput};
pub use key::DataKey;
pub use output::{encode_value, key_to_string, EncodeOutput};
pub use query::{ConstraintOp, FieldConstraint, Query};
pub use registry::{CodecRegistry, ErasedCodec, ErasedEnumCodec};
pub use types::{AnyObject, DataValue, ObjectValue, TypeDesc};
