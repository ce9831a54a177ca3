//! Inverted token index for channel search.

use crate::types::{ChannelId, MessageId};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

/// Split text into lowercase search tokens.
///
/// Tokens are maximal runs of alphanumeric characters and underscores, so
/// JSON punctuation never takes part in matching.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Index mapping tokens to the messages containing them.
pub struct TokenIndex {
    /// (channel, token) -> message ids.
    postings: RwLock<HashMap<(ChannelId, String), BTreeSet<MessageId>>>,
}

impl Default for TokenIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            postings: RwLock::new(HashMap::new()),
        }
    }

    /// Index every token of a message body.
    pub fn add(&self, channel: ChannelId, id: MessageId, body: &str) {
        let mut postings = self.postings.write();
        for token in tokenize(body) {
            postings.entry((channel, token)).or_default().insert(id);
        }
    }

    /// Drop a message body from the index.
    pub fn remove(&self, channel: ChannelId, id: MessageId, body: &str) {
        let mut postings = self.postings.write();
        for token in tokenize(body) {
            let key = (channel, token);
            if let Some(ids) = postings.get_mut(&key) {
                ids.remove(&id);
                if ids.is_empty() {
                    postings.remove(&key);
                }
            }
        }
    }

    /// Messages containing every token, newest first.
    ///
    /// Returns `None` when `tokens` is empty (no constraint).
    pub fn lookup(&self, channel: ChannelId, tokens: &[String]) -> Option<Vec<MessageId>> {
        let (first, rest) = tokens.split_first()?;
        let postings = self.postings.read();

        let mut matches = match postings.get(&(channel, first.clone())) {
            Some(ids) => ids.clone(),
            None => return Some(Vec::new()),
        };
        for token in rest {
            match postings.get(&(channel, token.clone())) {
                Some(ids) => matches.retain(|id| ids.contains(id)),
                None => return Some(Vec::new()),
            }
        }

        Some(matches.into_iter().rev().collect())
    }

    /// Number of distinct (channel, token) entries.
    pub fn token_count(&self) -> usize {
        self.postings.read().len()
    }
}
