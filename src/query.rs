//! Query execution against the channel's search primitive.
//!
//! A query is normalized, turned into its wire string and handed to the
//! transport's search. Results come back either as documents (content mode)
//! or as raw records (handle mode) for callers that need to mutate what they
//! found.
//!
//! Content mode is lossy: a record whose body does not parse as a JSON
//! object is dropped from the results and reported to diagnostics.

use crate::channel::MessageChannel;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, StoreError};
use crate::types::{ChannelId, ChannelMessage, Document, Query};
use crate::validate::Validator;
use futures_util::future;
use futures_util::stream::{StreamExt, TryStreamExt};

/// Default number of records a search may return.
pub const DEFAULT_LIMIT: usize = 100;

/// Runs searches scoped to one channel.
pub struct QueryExecutor<'s> {
    channel: &'s dyn MessageChannel,
    channel_id: ChannelId,
    validator: &'s Validator,
    diagnostics: &'s dyn Diagnostics,
}

impl<'s> QueryExecutor<'s> {
    pub fn new(
        channel: &'s dyn MessageChannel,
        channel_id: ChannelId,
        validator: &'s Validator,
        diagnostics: &'s dyn Diagnostics,
    ) -> Self {
        Self {
            channel,
            channel_id,
            validator,
            diagnostics,
        }
    }

    /// Handle mode: matching records as the transport returned them.
    pub async fn find_records(&self, query: Query, limit: usize) -> Result<Vec<ChannelMessage>> {
        let wire = self.wire(query)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let records: Vec<ChannelMessage> = self
            .channel
            .search(self.channel_id, &wire, limit)
            .take(limit)
            .map_err(StoreError::Channel)
            .try_collect()
            .await?;

        tracing::debug!(channel = %self.channel_id, query = %wire, count = records.len(), "search");
        Ok(records)
    }

    /// Content mode: matching records parsed into documents.
    ///
    /// Malformed records are skipped, not treated as failures.
    pub async fn find(&self, query: Query, limit: usize) -> Result<Vec<Document>> {
        let wire = self.wire(query)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let validator = self.validator;
        let diagnostics = self.diagnostics;

        let docs: Vec<Document> = self
            .channel
            .search(self.channel_id, &wire, limit)
            .take(limit)
            .map_err(StoreError::Channel)
            .try_filter_map(move |record| {
                let parsed = match validator.parse_record(&record.body) {
                    Ok(doc) => Some(doc),
                    Err(error) => {
                        diagnostics.record_skipped(record.handle, &error);
                        None
                    }
                };
                future::ready(Ok::<_, StoreError>(parsed))
            })
            .try_collect()
            .await?;

        tracing::debug!(channel = %self.channel_id, query = %wire, count = docs.len(), "find");
        Ok(docs)
    }

    /// First matching document, or `None` when nothing matched.
    pub async fn find_one(&self, query: Query) -> Result<Option<Document>> {
        Ok(self.find(query, 1).await?.into_iter().next())
    }

    /// First matching record, or `None` when nothing matched.
    pub async fn find_one_record(&self, query: Query) -> Result<Option<ChannelMessage>> {
        Ok(self.find_records(query, 1).await?.into_iter().next())
    }

    fn wire(&self, query: Query) -> Result<String> {
        let query = self.validator.normalize_query(query)?;
        self.validator.to_wire(&query)
    }
}
