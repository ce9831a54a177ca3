//! Main DocumentStore tying the components together.

use crate::channel::MessageChannel;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::error::Result;
use crate::mutation::MutationEngine;
use crate::query::{QueryExecutor, DEFAULT_LIMIT};
use crate::types::{
    BatchOutcome, ChannelId, ChannelMessage, Document, DocumentInput, Query, RecordHandle,
};
use crate::validate::{Validator, MAX_DOCUMENT_CHARS};
use std::sync::Arc;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Channel whose history backs the store.
    pub channel: ChannelId,

    /// Search limit used when an operation is given `None`.
    pub default_limit: usize,

    /// Ceiling on a document's canonical encoding, in characters.
    pub max_document_chars: usize,

    /// Throttle retries allowed per record in `insert_many` (None = unbounded).
    pub throttle_retry_limit: Option<u32>,
}

impl StoreConfig {
    /// Configuration for `channel` with default limits.
    pub fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            default_limit: DEFAULT_LIMIT,
            max_document_chars: MAX_DOCUMENT_CHARS,
            throttle_retry_limit: None,
        }
    }
}

/// A document store backed by one channel's message history.
///
/// Holds no documents itself: every read goes to the channel, which is the
/// only source of truth. Cloning is cheap and clones share the channel.
///
/// - Reads (`get_*`) never fail; errors degrade to `None`/empty and are
///   reported to diagnostics. `try_get_*` keep the error.
/// - Single-record writes return explicit errors.
/// - `delete_*` report success as a boolean (or a complete outcome).
/// - Batch writes return a [`BatchOutcome`] naming what took effect.
#[derive(Clone)]
pub struct DocumentStore {
    config: StoreConfig,

    channel: Arc<dyn MessageChannel>,

    validator: Validator,

    diagnostics: Arc<dyn Diagnostics>,
}

impl DocumentStore {
    /// Create a store over an already-connected channel.
    ///
    /// Whether the account may post to and manage the channel is not checked
    /// here.
    pub fn new(channel: Arc<dyn MessageChannel>, config: StoreConfig) -> Self {
        Self::with_diagnostics(channel, config, Arc::new(TracingDiagnostics))
    }

    /// Create a store that reports failures to `diagnostics`.
    pub fn with_diagnostics(
        channel: Arc<dyn MessageChannel>,
        config: StoreConfig,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        let validator = Validator::new(config.max_document_chars);
        Self {
            config,
            channel,
            validator,
            diagnostics,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.config.channel
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn query(&self) -> QueryExecutor<'_> {
        QueryExecutor::new(
            self.channel.as_ref(),
            self.config.channel,
            &self.validator,
            self.diagnostics.as_ref(),
        )
    }

    fn mutation(&self) -> MutationEngine<'_> {
        MutationEngine::new(
            self.channel.as_ref(),
            self.config.channel,
            &self.validator,
            self.diagnostics.as_ref(),
            self.config.throttle_retry_limit,
        )
    }

    fn limit(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.config.default_limit)
    }

    // --- Insert ---

    /// Insert one document, assigning `_id` if it has none.
    pub async fn insert_one(&self, data: impl Into<DocumentInput>) -> Result<Document> {
        self.mutation().insert_one(data.into()).await
    }

    /// Insert documents in order, waiting out throttling.
    ///
    /// Invalid input fails before anything is sent. A write failure stops
    /// the batch; the outcome lists the documents inserted before it.
    pub async fn insert_many(&self, data: impl Into<DocumentInput>) -> Result<BatchOutcome<Document>> {
        self.mutation().insert_many(data.into()).await
    }

    // --- Read ---

    /// First document matching `query`, or `None`.
    pub async fn get_one(&self, query: impl Into<Query>) -> Option<Document> {
        match self.try_get_one(query).await {
            Ok(doc) => doc,
            Err(error) => {
                self.diagnostics.read_degraded("get_one", &error);
                None
            }
        }
    }

    /// Like [`get_one`](Self::get_one), keeping transport and validation errors.
    pub async fn try_get_one(&self, query: impl Into<Query>) -> Result<Option<Document>> {
        self.query().find_one(query.into()).await
    }

    /// Documents matching `query`, at most `limit` (default 100).
    pub async fn get_many(&self, query: impl Into<Query>, limit: Option<usize>) -> Vec<Document> {
        match self.try_get_many(query, limit).await {
            Ok(docs) => docs,
            Err(error) => {
                self.diagnostics.read_degraded("get_many", &error);
                Vec::new()
            }
        }
    }

    /// Like [`get_many`](Self::get_many), keeping transport and validation errors.
    pub async fn try_get_many(
        &self,
        query: impl Into<Query>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        self.query().find(query.into(), self.limit(limit)).await
    }

    /// Matching records as stored, with their handles.
    pub async fn find_records(
        &self,
        query: impl Into<Query>,
        limit: Option<usize>,
    ) -> Result<Vec<ChannelMessage>> {
        self.query().find_records(query.into(), self.limit(limit)).await
    }

    // --- Update ---

    /// Merge `patch` into the first matching document.
    ///
    /// Fails with `NotFound` when nothing matches.
    pub async fn update_one(
        &self,
        query: impl Into<Query>,
        patch: impl Into<DocumentInput>,
    ) -> Result<Document> {
        self.mutation().update_one(query.into(), patch.into()).await
    }

    /// Merge `patch` into every matching document, continuing past failures.
    pub async fn update_many(
        &self,
        query: impl Into<Query>,
        patch: impl Into<DocumentInput>,
        limit: Option<usize>,
    ) -> Result<BatchOutcome<Document>> {
        let limit = self.limit(limit);
        self.mutation()
            .update_many(query.into(), patch.into(), limit)
            .await
    }

    // --- Delete ---

    /// Delete the first matching document. `Ok(false)` if none was deleted.
    pub async fn delete_one(&self, query: impl Into<Query>) -> Result<bool> {
        self.mutation().delete_one(query.into()).await
    }

    /// Delete matching documents, stopping at the first failure.
    pub async fn delete_many(
        &self,
        query: impl Into<Query>,
        limit: Option<usize>,
    ) -> Result<BatchOutcome<RecordHandle>> {
        let limit = self.limit(limit);
        self.mutation().delete_many(query.into(), limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config = StoreConfig::new(ChannelId(5));
        assert_eq!(config.default_limit, 100);
        assert_eq!(config.max_document_chars, 4090);
        assert_eq!(config.throttle_retry_limit, None);
    }

    #[tokio::test]
    async fn test_store_is_stateless() {
        let channel = Arc::new(MemoryChannel::new());
        let store = DocumentStore::new(channel.clone(), StoreConfig::new(ChannelId(5)));
        let other = store.clone();

        let doc = store.insert_one(json!({"k": "v"})).await.unwrap();
        let seen = other.get_one(json!({"_id": doc.id().unwrap()})).await;
        assert_eq!(seen, Some(doc));
    }

    #[tokio::test]
    async fn test_custom_size_limit() {
        let channel = Arc::new(MemoryChannel::new());
        let store = DocumentStore::new(
            channel,
            StoreConfig {
                max_document_chars: 10,
                ..StoreConfig::new(ChannelId(5))
            },
        );

        assert!(store.insert_one(json!({"k": "v"})).await.is_ok());
        assert!(store.insert_one(json!({"k": "too long"})).await.is_err());
    }
}
