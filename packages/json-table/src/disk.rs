//! A table storing one pretty-printed JSON document per key.
//!
//! File names derive from the key's string form, percent-escaped down to
//! a filesystem-safe alphabet. Documents are small and local; reads and
//! writes go straight to the filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use docmap_core::{
    document_to_json, encode_value, json_to_document, key_to_string, DataValue, Document,
    DocumentInput, EncodeOutput, Error, Query, Result, TypeDesc,
};
use docmap_datastore::DataTable;

const EXTENSION: &str = "json";

/// The string form of a scalar key document, as used for file names.
fn key_text(key: &Document) -> Result<String> {
    key_to_string(&DataValue::from_document(key))
}

/// A directory of JSON documents, one file per key.
pub struct JsonFileTable {
    dir: PathBuf,
    key_field_override: Option<String>,
}

impl JsonFileTable {
    /// Open (creating if needed) a table rooted at a directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            key_field_override: None,
        })
    }

    /// Keep primary keys under an alternate document field.
    pub fn with_key_field_override(mut self, key_field: impl Into<String>) -> Self {
        self.key_field_override = Some(key_field.into());
        self
    }

    /// The directory documents live under.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, key: &Document) -> Result<PathBuf> {
        let name = sanitize(&key_text(key)?);
        Ok(self.dir.join(format!("{}.{}", name, EXTENSION)))
    }

    fn read_file(path: &Path) -> Result<Option<Document>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let json: serde_json::Value = serde_json::from_str(&text).map_err(Error::remote)?;
        Ok(Some(json_to_document(&json)))
    }

    fn scan(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(document) = Self::read_file(&path)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    fn input(&self, document: Document) -> DocumentInput {
        match &self.key_field_override {
            Some(field) => DocumentInput::with_key_field_override(document, field.clone()),
            None => DocumentInput::new(document),
        }
    }
}

#[async_trait]
impl DataTable for JsonFileTable {
    async fn find_one(&self, query: &Query) -> Result<Option<DocumentInput>> {
        if let Some(key) = query.key() {
            let key = encode_value(None, key, &TypeDesc::Any)?;
            let found = Self::read_file(&self.file_for(&key)?)?
                .filter(|row| query.matches_document(row));
            return Ok(found.map(|row| self.input(row)));
        }

        let found = self
            .scan()?
            .into_iter()
            .find(|row| query.matches_document(row));
        Ok(found.map(|row| self.input(row)))
    }

    async fn find_all(&self, query: &Query) -> Result<Vec<DocumentInput>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|row| query.matches_document(row))
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

        let path = self.file_for(&key)?;
        let json = document_to_json(&output.finish());
        let text = serde_json::to_string_pretty(&json).map_err(Error::remote)?;
        fs::write(path, text)?;
        Ok(())
    }

    fn key_field_override(&self) -> Option<&str> {
        self.key_field_override.as_deref()
    }
}

/// Percent-escape a key string down to `[A-Za-z0-9._-]`.
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                out.push(byte as char);
            }
            other => {
                out.push('%');
                out.push_str(&format!("{:02X}", other));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize("user-1_a.b"), "user-1_a.b");
        assert_eq!(sanitize("a/b"), "a%2Fb");
        assert_eq!(sanitize("sp ace"), "sp%20ace");
    }
}
