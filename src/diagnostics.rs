//! Failure reporting for store operations.
//!
//! The store never logs through global state of its own: it reports to the
//! [`Diagnostics`] implementation it was built with. The default methods
//! emit `tracing` events, so [`TracingDiagnostics`] needs no code, while
//! [`MemoryDiagnostics`] keeps events around for inspection.

use crate::error::StoreError;
use crate::types::RecordHandle;
use parking_lot::Mutex;
use std::time::Duration;

/// Receives the events a store cannot return to its caller.
pub trait Diagnostics: Send + Sync {
    /// A read swallowed an error and degraded to an empty result.
    fn read_degraded(&self, operation: &'static str, error: &StoreError) {
        trace_read_degraded(operation, error);
    }

    /// A search hit a record whose body is not a document; it was skipped.
    fn record_skipped(&self, handle: RecordHandle, error: &StoreError) {
        trace_record_skipped(handle, error);
    }

    /// A mutation failed.
    fn write_failed(&self, operation: &'static str, handle: Option<RecordHandle>, error: &StoreError) {
        trace_write_failed(operation, handle, error);
    }

    /// The transport throttled a write; the store waits before retrying.
    fn throttled(&self, operation: &'static str, retry_after: Duration, attempt: u32) {
        trace_throttled(operation, retry_after, attempt);
    }
}

// --- Tracing Events ---

fn trace_read_degraded(operation: &'static str, error: &StoreError) {
    tracing::warn!(operation, %error, "read degraded to empty result");
}

fn trace_record_skipped(handle: RecordHandle, error: &StoreError) {
    tracing::warn!(record = %handle, %error, "skipping malformed record");
}

fn trace_write_failed(operation: &'static str, handle: Option<RecordHandle>, error: &StoreError) {
    match handle {
        Some(handle) => tracing::warn!(operation, record = %handle, %error, "write failed"),
        None => tracing::warn!(operation, %error, "write failed"),
    }
}

fn trace_throttled(operation: &'static str, retry_after: Duration, attempt: u32) {
    tracing::warn!(operation, ?retry_after, attempt, "throttled by transport, backing off");
}

/// Reports through `tracing` only.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {}

/// A recorded diagnostic event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticEvent {
    ReadDegraded {
        operation: &'static str,
        error: String,
    },
    RecordSkipped {
        handle: RecordHandle,
        error: String,
    },
    WriteFailed {
        operation: &'static str,
        handle: Option<RecordHandle>,
        error: String,
    },
    Throttled {
        operation: &'static str,
        retry_after: Duration,
        attempt: u32,
    },
}

/// Records events in memory and forwards them to `tracing`.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    /// Handles of records skipped as malformed, in the order seen.
    pub fn skipped(&self) -> Vec<RecordHandle> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DiagnosticEvent::RecordSkipped { handle, .. } => Some(*handle),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: DiagnosticEvent) {
        self.events.lock().push(event);
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn read_degraded(&self, operation: &'static str, error: &StoreError) {
        trace_read_degraded(operation, error);
        self.push(DiagnosticEvent::ReadDegraded {
            operation,
            error: error.to_string(),
        });
    }

    fn record_skipped(&self, handle: RecordHandle, error: &StoreError) {
        trace_record_skipped(handle, error);
        self.push(DiagnosticEvent::RecordSkipped {
            handle,
            error: error.to_string(),
        });
    }

    fn write_failed(&self, operation: &'static str, handle: Option<RecordHandle>, error: &StoreError) {
        trace_write_failed(operation, handle, error);
        self.push(DiagnosticEvent::WriteFailed {
            operation,
            handle,
            error: error.to_string(),
        });
    }

    fn throttled(&self, operation: &'static str, retry_after: Duration, attempt: u32) {
        trace_throttled(operation, retry_after, attempt);
        self.push(DiagnosticEvent::Throttled {
            operation,
            retry_after,
            attempt,
        });
    }
}
