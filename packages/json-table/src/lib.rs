//! JSON-backed `DataTable` implementations.
//!
//! Two local backends for embedding and testing:
//!
//! - [`MemoryTable`]: process-local, rows held in memory
//! - [`JsonFileTable`]: one JSON file per key under a directory
//!
//! Both speak the same document contract as any remote table: documents
//! in, documents out, primary key under the (possibly overridden) key
//! field.

mod disk;
mod memory;

pub use disk::JsonFileTable;
pub use memory::MemoryTable;
