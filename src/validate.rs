//! Input normalization, size limits and identity assignment.
//!
//! Every document entering or leaving the store passes through the
//! [`Validator`]. Size is checked before identity is assigned, so the
//! ceiling applies to what the caller supplied.

use crate::error::{Result, ValidationError};
use crate::types::{Document, DocumentInput, Query, ID_FIELD};
use serde_json::Value;
use uuid::Uuid;

/// Largest canonical encoding accepted, in characters.
pub const MAX_DOCUMENT_CHARS: usize = 4090;

/// Characters an assigned identity adds to an encoding: `,"_id":"`, 32 hex
/// digits and the closing quote.
pub const ASSIGNED_ID_CHARS: usize = 41;

/// Output of [`Validator::normalize`]: mirrors the shape of the input.
#[derive(Clone, Debug, PartialEq)]
pub enum Normalized {
    One(Document),
    Many(Vec<Document>),
}

/// Normalizes caller input into canonical documents.
#[derive(Clone, Debug)]
pub struct Validator {
    max_chars: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(MAX_DOCUMENT_CHARS)
    }
}

impl Validator {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Normalize a single input or a sequence of inputs.
    ///
    /// Sequences are normalized element by element, preserving order; the
    /// first invalid element fails the whole call.
    pub fn normalize(
        &self,
        input: impl Into<DocumentInput>,
        assign_identity: bool,
    ) -> Result<Normalized> {
        match input.into() {
            DocumentInput::Many(items) => items
                .into_iter()
                .map(|item| self.normalize_one(item, assign_identity))
                .collect::<Result<Vec<_>>>()
                .map(Normalized::Many),
            DocumentInput::Text(text) => self.normalize_value(parse_text(&text), assign_identity),
            DocumentInput::Value(value) => self.normalize_value(value, assign_identity),
        }
    }

    /// Normalize input that must be exactly one document.
    pub fn normalize_one(
        &self,
        input: impl Into<DocumentInput>,
        assign_identity: bool,
    ) -> Result<Document> {
        match self.normalize(input, assign_identity)? {
            Normalized::One(doc) => Ok(doc),
            Normalized::Many(_) => Err(ValidationError::NotAnObject("array").into()),
        }
    }

    /// Normalize input into a sequence; a single document becomes a
    /// one-element sequence.
    pub fn normalize_many(
        &self,
        input: impl Into<DocumentInput>,
        assign_identity: bool,
    ) -> Result<Vec<Document>> {
        match self.normalize(input, assign_identity)? {
            Normalized::One(doc) => Ok(vec![doc]),
            Normalized::Many(docs) => Ok(docs),
        }
    }

    /// Apply the size ceiling to a query.
    pub fn normalize_query(&self, query: impl Into<Query>) -> Result<Query> {
        let query = query.into();
        match &query {
            Query::Fragment(doc) => self.check_size(doc.to_json()?.chars().count())?,
            Query::RawText(text) => self.check_size(text.chars().count())?,
        }
        Ok(query)
    }

    /// Wire form of a query: canonical JSON for fragments, raw text as-is.
    pub fn to_wire(&self, query: &Query) -> Result<String> {
        match query {
            Query::Fragment(doc) => doc.to_json(),
            Query::RawText(text) => Ok(text.clone()),
        }
    }

    /// Canonical record body for a document.
    pub fn encode(&self, doc: &Document) -> Result<String> {
        doc.to_json()
    }

    /// Parse a stored record body back into a document.
    pub fn parse_record(&self, body: &str) -> Result<Document> {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Ok(Document::from(map)),
            Ok(other) => Err(ValidationError::MalformedRecord(format!(
                "body is a JSON {}",
                value_kind(&other)
            ))
            .into()),
            Err(e) => Err(ValidationError::MalformedRecord(e.to_string()).into()),
        }
    }

    fn normalize_value(&self, value: Value, assign_identity: bool) -> Result<Normalized> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.document_from_value(item, assign_identity))
                .collect::<Result<Vec<_>>>()
                .map(Normalized::Many),
            other => self
                .document_from_value(other, assign_identity)
                .map(Normalized::One),
        }
    }

    fn document_from_value(&self, value: Value, assign_identity: bool) -> Result<Document> {
        self.check_size(serde_json::to_string(&value)?.chars().count())?;

        let map = match value {
            Value::Object(map) => map,
            other => return Err(ValidationError::NotAnObject(value_kind(&other)).into()),
        };

        let mut doc = Document::from(map);
        if assign_identity && !doc.has_id() {
            doc.insert(ID_FIELD, generate_id());
        }
        Ok(doc)
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_chars {
            return Err(ValidationError::DocumentTooLarge {
                size,
                limit: self.max_chars,
            }
            .into());
        }
        Ok(())
    }
}

/// A fresh 128-bit identity, as 32 lowercase hex characters.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Text that is not JSON is kept as an opaque JSON string.
fn parse_text(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use serde_json::json;

    /// `{"k":"<pad>"}` with a canonical encoding of exactly `chars` characters.
    fn padded(chars: usize) -> Value {
        json!({ "k": "x".repeat(chars - 8) })
    }

    #[test]
    fn test_text_input_is_parsed() {
        let v = Validator::default();
        let doc = v.normalize_one(r#"{"name": "alice", "age": 30}"#, false).unwrap();
        assert_eq!(doc, json!({"name": "alice", "age": 30}));
        assert!(!doc.has_id());
    }

    #[test]
    fn test_identity_assigned_when_missing() {
        let v = Validator::default();
        let doc = v.normalize_one(json!({"a": 1}), true).unwrap();
        let id = doc.id().unwrap();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let other = v.normalize_one(json!({"a": 1}), true).unwrap();
        assert_ne!(doc.id(), other.id());
    }

    #[test]
    fn test_existing_identity_kept() {
        let v = Validator::default();
        let doc = v.normalize_one(json!({"_id": "mine", "a": 1}), true).unwrap();
        assert_eq!(doc.id(), Some("mine"));
    }

    #[test]
    fn test_plain_text_is_not_a_document() {
        let v = Validator::default();
        let err = v.normalize_one("just some words", true).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::NotAnObject("string"))
        ));
    }

    #[test]
    fn test_sequence_preserves_order() {
        let v = Validator::default();
        let docs = v
            .normalize_many(vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})], true)
            .unwrap();
        let ns: Vec<_> = docs.iter().map(|d| d.get("n").cloned().unwrap()).collect();
        assert_eq!(ns, vec![json!(1), json!(2), json!(3)]);
        assert!(docs.iter().all(|d| d.id().is_some()));
    }

    #[test]
    fn test_json_array_text_is_a_sequence() {
        let v = Validator::default();
        let normalized = v.normalize(r#"[{"a":1},{"b":2}]"#, false).unwrap();
        assert!(matches!(normalized, Normalized::Many(ref docs) if docs.len() == 2));
    }

    #[test]
    fn test_sequence_fails_fast() {
        let v = Validator::default();
        let result = v.normalize_many(vec![json!({"a": 1}), json!(5), padded(5000)], false);
        assert!(matches!(
            result,
            Err(StoreError::Validation(ValidationError::NotAnObject("number")))
        ));
    }

    #[test]
    fn test_size_boundary() {
        let v = Validator::default();
        assert_eq!(serde_json::to_string(&padded(4090)).unwrap().len(), 4090);

        assert!(v.normalize_one(padded(4090), false).is_ok());
        let err = v.normalize_one(padded(4091), false).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::DocumentTooLarge { size: 4091, limit: 4090 })
        ));
    }

    #[test]
    fn test_size_checked_before_identity() {
        let v = Validator::default();
        let doc = v.normalize_one(padded(4090), true).unwrap();
        assert!(doc.id().is_some());
        assert_eq!(
            doc.to_json().unwrap().chars().count(),
            4090 + ASSIGNED_ID_CHARS
        );
    }

    #[test]
    fn test_size_counts_characters() {
        let v = Validator::new(12);
        // {"k":"ééé"} is 11 characters but 14 bytes.
        assert!(v.normalize_one(json!({"k": "ééé"}), false).is_ok());
    }

    #[test]
    fn test_query_wire_form() {
        let v = Validator::default();
        let q = v.normalize_query(json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(v.to_wire(&q).unwrap(), r#"{"a":1,"b":2}"#);

        let q = v.normalize_query("alice").unwrap();
        assert_eq!(v.to_wire(&q).unwrap(), "alice");

        let long = "q".repeat(4091);
        assert!(v.normalize_query(long.as_str()).is_err());
    }

    #[test]
    fn test_parse_record() {
        let v = Validator::default();
        assert!(v.parse_record(r#"{"a":1}"#).is_ok());
        assert!(matches!(
            v.parse_record("hello there"),
            Err(StoreError::Validation(ValidationError::MalformedRecord(_)))
        ));
        assert!(matches!(
            v.parse_record("[1,2]"),
            Err(StoreError::Validation(ValidationError::MalformedRecord(_)))
        ));
    }
}
