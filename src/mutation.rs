//! Insert, update and delete on top of channel primitives.
//!
//! Single-record mutations are one transport call each and either take
//! effect or not. Batch mutations run record by record, in order, and report
//! exactly which records took effect; nothing is rolled back.
//!
//! Updates are read-then-write: a concurrent writer can change a record
//! between the search and the edit, and the later write wins.

use crate::channel::MessageChannel;
use crate::diagnostics::Diagnostics;
use crate::error::{ChannelError, Result, StoreError, ValidationError};
use crate::query::QueryExecutor;
use crate::types::{
    BatchFailure, BatchOutcome, ChannelId, ChannelMessage, Document, DocumentInput, Query,
    RecordHandle,
};
use crate::validate::Validator;

/// Applies document mutations to one channel.
pub struct MutationEngine<'s> {
    channel: &'s dyn MessageChannel,
    channel_id: ChannelId,
    validator: &'s Validator,
    diagnostics: &'s dyn Diagnostics,
    /// Maximum consecutive throttle retries per record in `insert_many`.
    throttle_retry_limit: Option<u32>,
}

impl<'s> MutationEngine<'s> {
    pub fn new(
        channel: &'s dyn MessageChannel,
        channel_id: ChannelId,
        validator: &'s Validator,
        diagnostics: &'s dyn Diagnostics,
        throttle_retry_limit: Option<u32>,
    ) -> Self {
        Self {
            channel,
            channel_id,
            validator,
            diagnostics,
            throttle_retry_limit,
        }
    }

    fn query(&self) -> QueryExecutor<'s> {
        QueryExecutor::new(self.channel, self.channel_id, self.validator, self.diagnostics)
    }

    // --- Insert ---

    /// Append one document, assigning `_id` if missing.
    ///
    /// No existence check: inserting the same data twice stores it twice.
    pub async fn insert_one(&self, data: DocumentInput) -> Result<Document> {
        let doc = self.validator.normalize_one(data, true)?;
        let body = self.validator.encode(&doc)?;

        match self.channel.send(self.channel_id, &body).await {
            Ok(handle) => {
                tracing::debug!(record = %handle, id = ?doc.id(), "inserted document");
                Ok(doc)
            }
            Err(e) => {
                let error = StoreError::from_write(e);
                self.diagnostics.write_failed("insert_one", None, &error);
                Err(error)
            }
        }
    }

    /// Append documents in order.
    ///
    /// The whole input is validated before anything is sent. A throttled send
    /// is retried after the transport's cooldown; any other failure stops the
    /// batch, leaving the records before it in place.
    pub async fn insert_many(&self, data: DocumentInput) -> Result<BatchOutcome<Document>> {
        let docs = self.validator.normalize_many(data, true)?;
        let bodies = docs
            .iter()
            .map(|doc| self.validator.encode(doc))
            .collect::<Result<Vec<_>>>()?;

        let mut outcome = BatchOutcome::new();
        for (index, (doc, body)) in docs.into_iter().zip(bodies).enumerate() {
            match self.send_with_backoff(&body).await {
                Ok(handle) => {
                    tracing::debug!(record = %handle, index, "inserted batch document");
                    outcome.succeeded.push(doc);
                }
                Err(error) => {
                    self.diagnostics.write_failed("insert_many", None, &error);
                    outcome.failures.push(BatchFailure {
                        index,
                        handle: None,
                        error,
                    });
                    break;
                }
            }
        }

        Ok(outcome)
    }

    /// Send one body, sleeping through throttle signals.
    async fn send_with_backoff(&self, body: &str) -> Result<RecordHandle> {
        let mut attempt: u32 = 0;
        loop {
            match self.channel.send(self.channel_id, body).await {
                Ok(handle) => return Ok(handle),
                Err(ChannelError::Throttled { retry_after }) => {
                    attempt += 1;
                    if let Some(limit) = self.throttle_retry_limit {
                        if attempt > limit {
                            return Err(StoreError::Throttled { retry_after });
                        }
                    }
                    self.diagnostics.throttled("insert_many", retry_after, attempt);
                    tokio::time::sleep(retry_after).await;
                }
                Err(e) => return Err(StoreError::from_write(e)),
            }
        }
    }

    // --- Delete ---

    /// Delete the first record matching `query`.
    ///
    /// Returns `Ok(false)` when nothing matched or the transport failed;
    /// only an invalid query is an error.
    pub async fn delete_one(&self, query: Query) -> Result<bool> {
        let record = match self.query().find_one_record(query).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(false),
            Err(error @ StoreError::Validation(_)) => return Err(error),
            Err(error) => {
                self.diagnostics.write_failed("delete_one", None, &error);
                return Ok(false);
            }
        };

        match self.channel.delete(record.handle).await {
            Ok(()) => {
                tracing::debug!(record = %record.handle, "deleted record");
                Ok(true)
            }
            Err(e) => {
                let error = StoreError::from_write(e);
                self.diagnostics
                    .write_failed("delete_one", Some(record.handle), &error);
                Ok(false)
            }
        }
    }

    /// Delete up to `limit` matching records, one at a time.
    ///
    /// The first failure stops the batch; records already deleted stay
    /// deleted. A failed search is reported as the outcome's only failure.
    pub async fn delete_many(&self, query: Query, limit: usize) -> Result<BatchOutcome<RecordHandle>> {
        let mut outcome = BatchOutcome::new();

        let records = match self.query().find_records(query, limit).await {
            Ok(records) => records,
            Err(error @ StoreError::Validation(_)) => return Err(error),
            Err(error) => {
                self.diagnostics.write_failed("delete_many", None, &error);
                outcome.failures.push(BatchFailure {
                    index: 0,
                    handle: None,
                    error,
                });
                return Ok(outcome);
            }
        };

        for (index, record) in records.into_iter().enumerate() {
            if let Err(e) = self.channel.delete(record.handle).await {
                let error = StoreError::from_write(e);
                self.diagnostics
                    .write_failed("delete_many", Some(record.handle), &error);
                outcome.failures.push(BatchFailure {
                    index,
                    handle: Some(record.handle),
                    error,
                });
                break;
            }
            outcome.succeeded.push(record.handle);
        }

        tracing::debug!(
            channel = %self.channel_id,
            deleted = outcome.succeeded.len(),
            complete = outcome.is_complete(),
            "delete_many"
        );
        Ok(outcome)
    }

    // --- Update ---

    /// Merge `patch` into the first record matching `query`, in place.
    ///
    /// The record is found and parsed before the patch is normalized, so a
    /// missing record is `NotFound` whatever the patch holds.
    pub async fn update_one(&self, query: Query, patch: DocumentInput) -> Result<Document> {
        let record = self
            .query()
            .find_one_record(query)
            .await?
            .ok_or(StoreError::NotFound)?;

        self.patch_record(&record, patch).await.map_err(|error| {
            self.diagnostics
                .write_failed("update_one", Some(record.handle), &error);
            error
        })
    }

    /// Merge the same `patch` into every record matching `query`.
    ///
    /// Records that cannot be parsed or edited are reported in the outcome
    /// and the remaining records are still processed.
    pub async fn update_many(
        &self,
        query: Query,
        patch: DocumentInput,
        limit: usize,
    ) -> Result<BatchOutcome<Document>> {
        let records = self.query().find_records(query, limit).await?;
        let patch = self.validator.normalize_one(patch, false)?;

        let mut outcome = BatchOutcome::new();
        for (index, record) in records.iter().enumerate() {
            match self.apply_patch(record, patch.clone()).await {
                Ok(merged) => outcome.succeeded.push(merged),
                Err(error) => {
                    self.diagnostics
                        .write_failed("update_many", Some(record.handle), &error);
                    outcome.failures.push(BatchFailure {
                        index,
                        handle: Some(record.handle),
                        error,
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Parse the stored body, then normalize `patch` and write the merge.
    async fn patch_record(&self, record: &ChannelMessage, patch: DocumentInput) -> Result<Document> {
        let current = self.validator.parse_record(&record.body)?;
        let patch = self.validator.normalize_one(patch, false)?;
        self.write_merged(record.handle, current, patch).await
    }

    /// Parse the stored body, merge, and write back to the same record.
    async fn apply_patch(&self, record: &ChannelMessage, patch: Document) -> Result<Document> {
        let current = self.validator.parse_record(&record.body)?;
        self.write_merged(record.handle, current, patch).await
    }

    /// Merge `patch` over `merged` and edit the record in place.
    ///
    /// The merged document must fit the same ceiling as an insert.
    async fn write_merged(
        &self,
        handle: RecordHandle,
        mut merged: Document,
        patch: Document,
    ) -> Result<Document> {
        merged.merge(patch);

        let body = self.validator.encode(&merged)?;
        let size = body.chars().count();
        let limit = self.validator.max_chars();
        if size > limit {
            return Err(ValidationError::DocumentTooLarge { size, limit }.into());
        }

        self.channel
            .edit(handle, &body)
            .await
            .map_err(StoreError::from_write)?;

        tracing::debug!(record = %handle, "updated record");
        Ok(merged)
    }
}
