//! # Channel Store
//!
//! A minimal document store that keeps its records as messages in a chat
//! channel and answers queries with the channel's own full-text search.
//!
//! ## Core Concepts
//!
//! - **Documents**: JSON objects, identified by an `_id` assigned on insert
//! - **Records**: one message per document, holding its canonical JSON
//! - **Queries**: a document fragment or raw text, handed to channel search
//! - **Channels**: anything implementing [`MessageChannel`]
//!
//! There are no indexes or transactions of its own; what a query matches is
//! whatever the transport's search matches.
//!
//! ## Example
//!
//! ```ignore
//! use channel_store::{ChannelId, DocumentStore, MemoryChannel, StoreConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let channel = Arc::new(MemoryChannel::new());
//! let store = DocumentStore::new(channel, StoreConfig::new(ChannelId(-1001)));
//!
//! let user = store.insert_one(json!({"name": "alice", "plan": "free"})).await?;
//! store.update_one(json!({"_id": user.id()}), json!({"plan": "pro"})).await?;
//!
//! let found = store.get_one(json!({"name": "alice"})).await;
//! ```

pub mod channel;
pub mod diagnostics;
pub mod error;
pub mod mutation;
pub mod query;
pub mod store;
pub mod types;
pub mod validate;

// Re-exports
pub use channel::{ChannelOp, MemoryChannel, MemoryChannelConfig, MessageChannel, MessageStream};
pub use diagnostics::{DiagnosticEvent, Diagnostics, MemoryDiagnostics, TracingDiagnostics};
pub use error::{ChannelError, Result, StoreError, ValidationError};
pub use mutation::MutationEngine;
pub use query::{QueryExecutor, DEFAULT_LIMIT};
pub use store::{DocumentStore, StoreConfig};
pub use types::*;
pub use validate::{generate_id, Normalized, Validator, ASSIGNED_ID_CHARS, MAX_DOCUMENT_CHARS};
