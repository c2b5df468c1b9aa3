//! Queries: an optional primary key plus a conjunction of field
//! constraints.
//!
//! A query by key is the simplest and fastest form; field constraints are
//! compiled into value predicates by the datastore's codec for in-memory
//! scans, and handed to the table layer for remote lookups.

use std::fmt;
use std::sync::Arc;

use crate::document::Document;
use crate::types::DataValue;

/// How a constraint compares a field value.
#[derive(Clone)]
pub enum ConstraintOp {
    /// The field equals the given value.
    Eq(DataValue),
    /// The field differs from the given value.
    Ne(DataValue),
    /// An arbitrary predicate over the field value.
    Predicate(Arc<dyn Fn(&DataValue) -> bool + Send + Sync>),
}

impl fmt::Debug for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintOp::Eq(v) => f.debug_tuple("Eq").field(v).finish(),
            ConstraintOp::Ne(v) => f.debug_tuple("Ne").field(v).finish(),
            ConstraintOp::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A constraint on the values of one field.
#[derive(Clone, Debug)]
pub struct FieldConstraint {
    field: String,
    op: ConstraintOp,
}

impl FieldConstraint {
    /// Constrain a field to equal a value.
    pub fn eq(field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self {
            field: field.into(),
            op: ConstraintOp::Eq(value.into()),
        }
    }

    /// Constrain a field to differ from a value.
    pub fn ne(field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self {
            field: field.into(),
            op: ConstraintOp::Ne(value.into()),
        }
    }

    /// Constrain a field with an arbitrary predicate.
    pub fn matching(
        field: impl Into<String>,
        predicate: impl Fn(&DataValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            field: field.into(),
            op: ConstraintOp::Predicate(Arc::new(predicate)),
        }
    }

    /// The constrained field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Test the constraint against a field value.
    pub fn matches(&self, value: &DataValue) -> bool {
        match &self.op {
            ConstraintOp::Eq(expected) => value == expected,
            ConstraintOp::Ne(expected) => value != expected,
            ConstraintOp::Predicate(p) => p(value),
        }
    }

    /// Test the constraint against a document's field.
    ///
    /// An absent field is tested as null.
    pub fn matches_document(&self, document: &Document) -> bool {
        let value = document
            .field(&self.field)
            .map(DataValue::from_document)
            .unwrap_or(DataValue::Null);
        self.matches(&value)
    }
}

/// An optional primary key plus a conjunction of field constraints.
#[derive(Clone, Debug, Default)]
pub struct Query {
    key: Option<DataValue>,
    key_field: Option<String>,
    constraints: Vec<FieldConstraint>,
}

impl Query {
    /// A query matching everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// The simplest form: look up one record by primary key.
    pub fn by_key(key: impl Into<DataValue>) -> Self {
        Self {
            key: Some(key.into()),
            key_field: None,
            constraints: Vec::new(),
        }
    }

    /// Add an equality constraint.
    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.constraints.push(FieldConstraint::eq(field, value));
        self
    }

    /// Add an arbitrary constraint.
    pub fn and(mut self, constraint: FieldConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Whether the query carries a primary key.
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// The primary-key value, if any.
    pub fn key(&self) -> Option<&DataValue> {
        self.key.as_ref()
    }

    /// The document field the key lives under, once qualified.
    pub fn key_field(&self) -> Option<&str> {
        self.key_field.as_deref()
    }

    /// The field constraints.
    pub fn constraints(&self) -> &[FieldConstraint] {
        &self.constraints
    }

    /// Bind the query to a datastore's primary-key field.
    ///
    /// Idempotent: an already-qualified query keeps its field.
    pub fn qualify(mut self, key_field: &str) -> Self {
        if self.key_field.is_none() {
            self.key_field = Some(key_field.to_string());
        }
        self
    }

    /// Test all field constraints against a document.
    pub fn matches_document(&self, document: &Document) -> bool {
        self.constraints.iter().all(|c| c.matches_document(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_doc(name: &str, score: i64) -> Document {
        [
            ("name".to_string(), Document::from(name)),
            ("score".to_string(), Document::from(score)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn by_key_carries_the_key() {
        let q = Query::by_key(7i64);
        assert!(q.has_key());
        assert_eq!(q.key(), Some(&DataValue::Int(7)));
        assert!(q.constraints().is_empty());
    }

    #[test]
    fn qualify_is_idempotent() {
        let q = Query::by_key(7i64).qualify("id").qualify("_id");
        assert_eq!(q.key_field(), Some("id"));
    }

    #[test]
    fn eq_constraint_matches_documents() {
        let c = FieldConstraint::eq("name", "Alice");
        assert!(c.matches_document(&user_doc("Alice", 10)));
        assert!(!c.matches_document(&user_doc("Bob", 10)));
    }

    #[test]
    fn absent_field_tests_as_null() {
        let c = FieldConstraint::eq("missing", DataValue::Null);
        assert!(c.matches_document(&user_doc("Alice", 10)));
    }

    #[test]
    fn ne_and_predicate_constraints() {
        let ne = FieldConstraint::ne("name", "Bob");
        assert!(ne.matches_document(&user_doc("Alice", 10)));

        let high = FieldConstraint::matching("score", |v| v.to_i64().map_or(false, |s| s > 50));
        assert!(high.matches_document(&user_doc("Alice", 90)));
        assert!(!high.matches_document(&user_doc("Alice", 10)));
    }

    #[test]
    fn query_conjunction() {
        let q = Query::all()
            .and_eq("name", "Alice")
            .and(FieldConstraint::matching("score", |v| {
                v.to_i64().map_or(false, |s| s >= 10)
            }));

        assert!(q.matches_document(&user_doc("Alice", 10)));
        assert!(!q.matches_document(&user_doc("Alice", 9)));
        assert!(!q.matches_document(&user_doc("Bob", 10)));
    }
}
