//! In-memory table keyed by the canonical JSON text of the primary key.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use docmap_core::{
    document_to_json, encode_value, Document, DocumentInput, EncodeOutput, Error, Query, Result,
    TypeDesc,
};
use docmap_datastore::DataTable;

/// A process-local table of documents.
///
/// Useful for tests and for embedding a datastore with no remote source.
/// All operations are thread-safe; rows are stored whole and returned as
/// clones.
#[derive(Default)]
pub struct MemoryTable {
    rows: Mutex<HashMap<String, Document>>,
    key_field_override: Option<String>,
}

impl MemoryTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep primary keys under an alternate document field.
    pub fn with_key_field_override(mut self, key_field: impl Into<String>) -> Self {
        self.key_field_override = Some(key_field.into());
        self
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.rows().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<String, Document>> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Canonical identity of a key document.
    fn canonical(key: &Document) -> String {
        document_to_json(key).to_string()
    }

    fn encoded_key(query: &Query) -> Result<Option<Document>> {
        match query.key() {
            Some(key) => encode_value(None, key, &TypeDesc::Any).map(Some),
            None => Ok(None),
        }
    }

    fn input(&self, document: Document) -> DocumentInput {
        match &self.key_field_override {
            Some(field) => DocumentInput::with_key_field_override(document, field.clone()),
            None => DocumentInput::new(document),
        }
    }
}

#[async_trait]
impl DataTable for MemoryTable {
    async fn find_one(&self, query: &Query) -> Result<Option<DocumentInput>> {
        let rows = self.rows();

        let found = match Self::encoded_key(query)? {
            Some(key) => rows
                .get(&Self::canonical(&key))
                .filter(|row| query.matches_document(row)),
            None => rows.values().find(|row| query.matches_document(row)),
        };

        Ok(found.cloned().map(|row| self.input(row)))
    }

    async fn find_all(&self, query: &Query) -> Result<Vec<DocumentInput>> {
        let rows = self.rows();
        Ok(rows
            .values()
            .filter(|row| query.matches_document(row))
            .cloned()
            .map(|row| self.input(row))
            .collect())
    }

    async fn replace_one(&self, output: EncodeOutput) -> Result<()> {
        let key = match output.key() {
            Some((_, key)) => key.clone(),
            None => {
                return Err(Error::MissingPrimaryKey(
                    self.key_field_override.clone().unwrap_or_default(),
                ))
            }
        };

        self.rows()
            .insert(Self::canonical(&key), output.finish());
        Ok(())
    }

    fn key_field_override(&self) -> Option<&str> {
        self.key_field_override.as_deref()
    }
}
