//! The seam to the backing store.
//!
//! The datastore layer only ever sees a `DataTable`: something that can
//! find documents by query and replace them whole. Remote I/O, the wire
//! protocol, and query translation all live behind this trait.

use async_trait::async_trait;

use docmap_core::{DocumentInput, EncodeOutput, Query, Result};

/// One remote table of documents.
///
/// # Object Safety
///
/// This trait is object-safe: datastores hold a `Arc<dyn DataTable>`.
#[async_trait]
pub trait DataTable: Send + Sync {
    /// Find at most one document matching a query.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No document matched.
    /// * `Ok(Some(input))` - A decode input over the matched document.
    /// * `Err(Error)` - The source reported a failure.
    async fn find_one(&self, query: &Query) -> Result<Option<DocumentInput>>;

    /// Find all documents matching a query.
    async fn find_all(&self, query: &Query) -> Result<Vec<DocumentInput>>;

    /// Replace (or insert) the document identified by the output's
    /// primary-key slot.
    async fn replace_one(&self, output: EncodeOutput) -> Result<()>;

    /// The alternate document field this table keeps primary keys in.
    fn key_field_override(&self) -> Option<&str> {
        None
    }

    /// A fresh output for encoding one document destined for this table.
    fn create_output(&self) -> EncodeOutput {
        match self.key_field_override() {
            Some(field) => EncodeOutput::with_key_field_override(field),
            None => EncodeOutput::new(),
        }
    }
}
