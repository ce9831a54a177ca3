//! Core types for the document store.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field holding a document's identity.
pub const ID_FIELD: &str = "_id";

/// Identifier of the chat/group whose history backs a store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub i64);

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-assigned message number, unique within a channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl MessageId {
    pub fn next(self) -> Self {
        MessageId(self.0 + 1)
    }
}

/// Opaque address of a stored record, needed to edit or delete it.
///
/// Not part of the document itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct RecordHandle {
    pub channel: ChannelId,
    pub message_id: MessageId,
}

impl RecordHandle {
    pub fn new(channel: ChannelId, message_id: MessageId) -> Self {
        Self { channel, message_id }
    }
}

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel.0, self.message_id.0)
    }
}

/// A message as returned by a channel search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelMessage {
    pub handle: RecordHandle,
    pub body: String,
}

/// A JSON object keyed by strings.
///
/// Keys are kept sorted, so the compact JSON encoding is canonical.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// The document's `_id`, if it is a string.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn has_id(&self) -> bool {
        self.0.contains_key(ID_FIELD)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Shallow merge: every key in `patch` overwrites or extends this
    /// document, except `_id`, which is never taken from the patch.
    pub fn merge(&mut self, patch: Document) {
        for (key, value) in patch.0 {
            if key == ID_FIELD {
                continue;
            }
            self.0.insert(key, value);
        }
    }

    /// Canonical JSON encoding (compact, sorted keys).
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&self.0)?)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

impl PartialEq<Value> for Document {
    fn eq(&self, other: &Value) -> bool {
        other.as_object() == Some(&self.0)
    }
}

/// Caller input accepted wherever a document (or several) is expected.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentInput {
    /// JSON text, or any other text (treated as an opaque string).
    Text(String),
    /// An already-parsed JSON value.
    Value(Value),
    /// A sequence of inputs, normalized element by element.
    Many(Vec<DocumentInput>),
}

impl From<&str> for DocumentInput {
    fn from(text: &str) -> Self {
        DocumentInput::Text(text.to_string())
    }
}

impl From<String> for DocumentInput {
    fn from(text: String) -> Self {
        DocumentInput::Text(text)
    }
}

impl From<Value> for DocumentInput {
    fn from(value: Value) -> Self {
        DocumentInput::Value(value)
    }
}

impl From<Document> for DocumentInput {
    fn from(doc: Document) -> Self {
        DocumentInput::Value(doc.into_value())
    }
}

impl From<Map<String, Value>> for DocumentInput {
    fn from(map: Map<String, Value>) -> Self {
        DocumentInput::Value(Value::Object(map))
    }
}

impl<T: Into<DocumentInput>> From<Vec<T>> for DocumentInput {
    fn from(items: Vec<T>) -> Self {
        DocumentInput::Many(items.into_iter().map(Into::into).collect())
    }
}

/// What to search the channel for.
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    /// Plain search text, sent as-is.
    RawText(String),
    /// A document fragment, sent as its canonical JSON encoding.
    Fragment(Document),
}

impl Query {
    /// Classify text: a JSON object becomes a fragment, anything else is
    /// searched for verbatim.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Query::Fragment(Document::from(map)),
            _ => Query::RawText(text.to_string()),
        }
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::parse(text)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Query::parse(&text)
    }
}

impl From<Value> for Query {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Query::Fragment(Document::from(map)),
            Value::String(text) => Query::RawText(text),
            other => Query::RawText(other.to_string()),
        }
    }
}

impl From<Document> for Query {
    fn from(doc: Document) -> Self {
        Query::Fragment(doc)
    }
}

/// A record that could not be processed as part of a batch.
#[derive(Debug)]
pub struct BatchFailure {
    /// Position in the batch (input order for inserts, match order otherwise).
    pub index: usize,
    /// Record involved, when the failure happened after the record was located.
    pub handle: Option<RecordHandle>,
    pub error: StoreError,
}

/// Result of a multi-record operation.
///
/// Batches are not transactional: `succeeded` lists exactly the records that
/// took effect, `failures` lists the ones that did not.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failures: Vec<BatchFailure>,
}

impl<T> BatchOutcome<T> {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when no record failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.succeeded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty()
    }

    pub fn into_succeeded(self) -> Vec<T> {
        self.succeeded
    }
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self::new()
    }
}
