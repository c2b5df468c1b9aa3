//! Conversions between Document and serde_json values.
//!
//! Used by JSON-backed tables to persist document trees. JSON has no
//! binary type, so bytes travel base64-encoded and come back as strings;
//! tables that need lossless binary round trips should use a binary wire
//! format instead.

use base64::Engine;

use crate::document::Document;

/// Convert a document to a serde_json value.
pub fn document_to_json(document: &Document) -> serde_json::Value {
    match document {
        Document::Null => serde_json::Value::Null,
        Document::Bool(b) => serde_json::Value::Bool(*b),
        Document::Int32(v) => serde_json::Value::Number((*v).into()),
        Document::Int64(v) => serde_json::Value::Number((*v).into()),
        Document::Double(v) => serde_json::Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Document::String(s) => serde_json::Value::String(s.clone()),
        Document::Bytes(b) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(b);
            serde_json::Value::String(encoded)
        }
        Document::Array(items) => {
            serde_json::Value::Array(items.iter().map(document_to_json).collect())
        }
        Document::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), document_to_json(v)))
                .collect(),
        ),
    }
}

/// Convert a serde_json value to a document.
pub fn json_to_document(json: &serde_json::Value) -> Document {
    match json {
        serde_json::Value::Null => Document::Null,
        serde_json::Value::Bool(b) => Document::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Document::Int64(i)
            } else if let Some(f) = n.as_f64() {
                Document::Double(f)
            } else {
                // very large unsigned numbers keep their text form
                Document::String(n.to_string())
            }
        }
        serde_json::Value::String(s) => Document::String(s.clone()),
        serde_json::Value::Array(items) => {
            Document::Array(items.iter().map(json_to_document).collect())
        }
        serde_json::Value::Object(map) => Document::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_document(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_map() {
        let doc: Document = [
            ("name".to_string(), Document::from("Alice")),
            ("score".to_string(), Document::from(42i64)),
            ("active".to_string(), Document::from(true)),
        ]
        .into_iter()
        .collect();

        let json = document_to_json(&doc);
        let back = json_to_document(&json);
        assert_eq!(back, doc);
    }

    #[test]
    fn numbers_map_to_json() {
        let json = document_to_json(&Document::from(2.75));
        assert_eq!(json, serde_json::json!(2.75));

        let json = document_to_json(&Document::from(-100i32));
        assert_eq!(json, serde_json::json!(-100));
    }

    #[test]
    fn int32_comes_back_as_int64() {
        // JSON erases integer width; readers narrow through coercion
        let back = json_to_document(&document_to_json(&Document::from(5i32)));
        assert_eq!(back, Document::Int64(5));
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(
            document_to_json(&Document::from(f64::NAN)),
            serde_json::Value::Null
        );
    }

    #[test]
    fn bytes_travel_base64() {
        let json = document_to_json(&Document::Bytes(vec![1, 2, 3]));
        assert_eq!(json, serde_json::json!("AQID"));
    }

    #[test]
    fn arrays_convert_elementwise() {
        let json = document_to_json(&Document::from(vec![1i64, 2, 3]));
        assert_eq!(json, serde_json::json!([1, 2, 3]));
    }
}
