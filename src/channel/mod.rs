//! Message channel abstraction.
//!
//! A channel is an ordered message history that supports sending, editing,
//! deleting and full-text search. The store treats it as its only source of
//! truth; any transport (a chat group, a test double) can back a store by
//! implementing [`MessageChannel`].
//!
//! [`MemoryChannel`] is an in-process implementation with an inverted token
//! index, used for tests, benchmarks and embedding.

mod index;
mod memory;

pub use index::{tokenize, TokenIndex};
pub use memory::{ChannelOp, MemoryChannel, MemoryChannelConfig, DEFAULT_MAX_MESSAGE_CHARS};

use crate::error::ChannelError;
use crate::types::{ChannelId, ChannelMessage, RecordHandle};
use async_trait::async_trait;
use futures_util::stream::BoxStream;

/// Lazy sequence of search results.
pub type MessageStream<'a> = BoxStream<'a, Result<ChannelMessage, ChannelError>>;

/// Transport primitives the store is built on.
///
/// Every operation may fail with [`ChannelError::Throttled`]; the caller
/// decides whether to wait and retry.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Post a new message and return its handle.
    async fn send(&self, channel: ChannelId, body: &str) -> Result<RecordHandle, ChannelError>;

    /// Replace the text of an existing message in place.
    async fn edit(&self, handle: RecordHandle, body: &str) -> Result<(), ChannelError>;

    /// Remove a message.
    async fn delete(&self, handle: RecordHandle) -> Result<(), ChannelError>;

    /// Search a channel's history, yielding at most `limit` messages.
    fn search<'a>(&'a self, channel: ChannelId, query: &'a str, limit: usize)
        -> MessageStream<'a>;
}
