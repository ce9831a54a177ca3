//! In-process message channel.

use super::index::{tokenize, TokenIndex};
use super::{MessageChannel, MessageStream};
use crate::error::ChannelError;
use crate::types::{ChannelId, ChannelMessage, MessageId, RecordHandle};
use crate::validate::{ASSIGNED_ID_CHARS, MAX_DOCUMENT_CHARS};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Room for the largest accepted document plus an assigned `_id`.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = MAX_DOCUMENT_CHARS + ASSIGNED_ID_CHARS;

/// Channel configuration.
#[derive(Clone, Debug)]
pub struct MemoryChannelConfig {
    /// Longest message body accepted by `send`/`edit`, in characters.
    pub max_message_chars: usize,
}

impl Default for MemoryChannelConfig {
    fn default() -> Self {
        Self {
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }
}

/// Channel primitive, used to script faults and count calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelOp {
    Send,
    Edit,
    Delete,
    Search,
}

/// Message history of one channel.
#[derive(Default)]
struct ChannelLog {
    /// Last id handed out (ids start at 1).
    last_id: MessageId,
    messages: BTreeMap<MessageId, String>,
}

/// Append-only message history per channel, searchable by token.
///
/// Message ids increase monotonically and are never reused, even after
/// deletion. Search returns the newest matches first.
pub struct MemoryChannel {
    config: MemoryChannelConfig,

    logs: RwLock<HashMap<ChannelId, ChannelLog>>,

    index: TokenIndex,

    /// Scripted outcomes per primitive, consumed one per call.
    faults: Mutex<HashMap<ChannelOp, VecDeque<Result<(), ChannelError>>>>,

    /// Calls made per primitive, including failed ones.
    calls: Mutex<HashMap<ChannelOp, usize>>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    /// Create an empty channel set with default limits.
    pub fn new() -> Self {
        Self::with_config(MemoryChannelConfig::default())
    }

    pub fn with_config(config: MemoryChannelConfig) -> Self {
        Self {
            config,
            logs: RwLock::new(HashMap::new()),
            index: TokenIndex::new(),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Queue outcomes for the next calls of `op`.
    ///
    /// Each call pops one outcome: `Ok(())` lets the call proceed normally,
    /// `Err(e)` fails it with `e` without touching the history. Once the
    /// queue is empty calls behave normally.
    pub fn script(
        &self,
        op: ChannelOp,
        outcomes: impl IntoIterator<Item = Result<(), ChannelError>>,
    ) {
        self.faults.lock().entry(op).or_default().extend(outcomes);
    }

    /// Number of times `op` was invoked.
    pub fn call_count(&self, op: ChannelOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Append a message directly, bypassing scripted faults and limits.
    pub fn append(&self, channel: ChannelId, body: &str) -> RecordHandle {
        let mut logs = self.logs.write();
        let log = logs.entry(channel).or_default();

        log.last_id = log.last_id.next();
        let id = log.last_id;
        log.messages.insert(id, body.to_string());
        self.index.add(channel, id, body);

        RecordHandle::new(channel, id)
    }

    /// Current body of a message.
    pub fn get(&self, handle: RecordHandle) -> Option<String> {
        self.logs
            .read()
            .get(&handle.channel)
            .and_then(|log| log.messages.get(&handle.message_id).cloned())
    }

    /// All live messages of a channel, oldest first.
    pub fn messages(&self, channel: ChannelId) -> Vec<ChannelMessage> {
        self.logs
            .read()
            .get(&channel)
            .map(|log| {
                log.messages
                    .iter()
                    .map(|(id, body)| ChannelMessage {
                        handle: RecordHandle::new(channel, *id),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of live messages in a channel.
    pub fn len(&self, channel: ChannelId) -> usize {
        self.logs
            .read()
            .get(&channel)
            .map_or(0, |log| log.messages.len())
    }

    pub fn is_empty(&self, channel: ChannelId) -> bool {
        self.len(channel) == 0
    }

    /// Record the call and pop its scripted outcome.
    fn enter(&self, op: ChannelOp) -> Result<(), ChannelError> {
        *self.calls.lock().entry(op).or_default() += 1;
        self.faults
            .lock()
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(()))
    }

    fn check_body(&self, body: &str) -> Result<(), ChannelError> {
        if body.trim().is_empty() {
            return Err(ChannelError::Rejected("message text is empty".into()));
        }
        let chars = body.chars().count();
        if chars > self.config.max_message_chars {
            return Err(ChannelError::Rejected(format!(
                "message is too long ({} > {} characters)",
                chars, self.config.max_message_chars
            )));
        }
        Ok(())
    }

    fn matching(&self, channel: ChannelId, query: &str, limit: usize) -> Vec<ChannelMessage> {
        let logs = self.logs.read();
        let log = match logs.get(&channel) {
            Some(log) => log,
            None => return Vec::new(),
        };

        let ids: Vec<MessageId> = match self.index.lookup(channel, &tokenize(query)) {
            Some(ids) => ids,
            None => log.messages.keys().rev().copied().collect(),
        };

        ids.into_iter()
            .filter_map(|id| {
                log.messages.get(&id).map(|body| ChannelMessage {
                    handle: RecordHandle::new(channel, id),
                    body: body.clone(),
                })
            })
            .take(limit)
            .collect()
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn send(&self, channel: ChannelId, body: &str) -> Result<RecordHandle, ChannelError> {
        self.enter(ChannelOp::Send)?;
        self.check_body(body)?;
        Ok(self.append(channel, body))
    }

    async fn edit(&self, handle: RecordHandle, body: &str) -> Result<(), ChannelError> {
        self.enter(ChannelOp::Edit)?;
        self.check_body(body)?;

        let mut logs = self.logs.write();
        let current = logs
            .get_mut(&handle.channel)
            .and_then(|log| log.messages.get_mut(&handle.message_id))
            .ok_or(ChannelError::MessageNotFound(handle))?;

        self.index.remove(handle.channel, handle.message_id, current);
        *current = body.to_string();
        self.index.add(handle.channel, handle.message_id, body);
        Ok(())
    }

    async fn delete(&self, handle: RecordHandle) -> Result<(), ChannelError> {
        self.enter(ChannelOp::Delete)?;

        let mut logs = self.logs.write();
        let removed = logs
            .get_mut(&handle.channel)
            .and_then(|log| log.messages.remove(&handle.message_id))
            .ok_or(ChannelError::MessageNotFound(handle))?;

        self.index.remove(handle.channel, handle.message_id, &removed);
        Ok(())
    }

    fn search<'a>(
        &'a self,
        channel: ChannelId,
        query: &'a str,
        limit: usize,
    ) -> MessageStream<'a> {
        if let Err(e) = self.enter(ChannelOp::Search) {
            return stream::once(async move { Err::<ChannelMessage, _>(e) }).boxed();
        }
        stream::iter(self.matching(channel, query, limit).into_iter().map(Ok)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use std::time::Duration;

    const CH: ChannelId = ChannelId(-1001);

    async fn search(channel: &MemoryChannel, query: &str, limit: usize) -> Vec<String> {
        channel
            .search(CH, query, limit)
            .map_ok(|m| m.body)
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_assigns_increasing_ids() {
        let channel = MemoryChannel::new();
        let a = channel.send(CH, "first").await.unwrap();
        let b = channel.send(CH, "second").await.unwrap();

        assert_eq!(a.message_id, MessageId(1));
        assert_eq!(b.message_id, MessageId(2));
        assert_eq!(channel.len(CH), 2);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let channel = MemoryChannel::new();
        let a = channel.send(CH, "first").await.unwrap();
        channel.delete(a).await.unwrap();
        let b = channel.send(CH, "second").await.unwrap();
        assert_eq!(b.message_id, MessageId(2));
    }

    #[tokio::test]
    async fn test_search_newest_first_with_limit() {
        let channel = MemoryChannel::new();
        channel.send(CH, r#"{"n":1,"tag":"x"}"#).await.unwrap();
        channel.send(CH, r#"{"n":2,"tag":"x"}"#).await.unwrap();
        channel.send(CH, r#"{"n":3,"tag":"y"}"#).await.unwrap();

        assert_eq!(
            search(&channel, "x", 10).await,
            vec![r#"{"n":2,"tag":"x"}"#, r#"{"n":1,"tag":"x"}"#]
        );
        assert_eq!(search(&channel, "tag", 1).await, vec![r#"{"n":3,"tag":"y"}"#]);
        assert_eq!(search(&channel, "", 10).await.len(), 3);
    }

    #[tokio::test]
    async fn test_edit_reindexes() {
        let channel = MemoryChannel::new();
        let handle = channel.send(CH, "old words").await.unwrap();
        channel.edit(handle, "new words").await.unwrap();

        assert!(search(&channel, "old", 10).await.is_empty());
        assert_eq!(search(&channel, "new", 10).await, vec!["new words"]);
        assert_eq!(channel.get(handle).as_deref(), Some("new words"));
    }

    #[tokio::test]
    async fn test_missing_message() {
        let channel = MemoryChannel::new();
        let handle = channel.send(CH, "gone").await.unwrap();
        channel.delete(handle).await.unwrap();

        assert_eq!(
            channel.edit(handle, "again").await,
            Err(ChannelError::MessageNotFound(handle))
        );
        assert_eq!(
            channel.delete(handle).await,
            Err(ChannelError::MessageNotFound(handle))
        );
        assert!(search(&channel, "gone", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_length_limit() {
        let channel = MemoryChannel::with_config(MemoryChannelConfig {
            max_message_chars: 5,
        });
        assert!(channel.send(CH, "12345").await.is_ok());
        assert!(matches!(
            channel.send(CH, "123456").await,
            Err(ChannelError::Rejected(_))
        ));
        assert!(matches!(channel.send(CH, "  ").await, Err(ChannelError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_scripted_faults() {
        let channel = MemoryChannel::new();
        let throttle = ChannelError::Throttled {
            retry_after: Duration::from_secs(2),
        };
        channel.script(ChannelOp::Send, [Ok(()), Err(throttle.clone())]);

        assert!(channel.send(CH, "a").await.is_ok());
        assert_eq!(channel.send(CH, "b").await, Err(throttle));
        assert!(channel.send(CH, "c").await.is_ok());

        assert_eq!(channel.call_count(ChannelOp::Send), 3);
        assert_eq!(channel.len(CH), 2);
    }

    #[tokio::test]
    async fn test_search_fault() {
        let channel = MemoryChannel::new();
        channel.send(CH, "hello").await.unwrap();
        channel.script(ChannelOp::Search, [Err(ChannelError::Timeout)]);

        let result: Result<Vec<_>, _> = channel.search(CH, "hello", 10).try_collect().await;
        assert_eq!(result, Err(ChannelError::Timeout));
    }
}
