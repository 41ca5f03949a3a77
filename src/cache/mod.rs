//! Conversation cache: single-flight message nodes and bounded eviction.
//!
//! The cache is shared by every in-flight trigger for the lifetime of the
//! process. Each entry is populated at most once (all concurrent resolvers
//! for an identifier observe the one fetch), and the cache is trimmed back
//! to a configured bound after each resolution.

mod entry;
mod evict;
mod resolver;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::{ChainMessage, MessageId};

pub use entry::{CacheEntry, NodeRecord};
pub use resolver::{ChainResolver, ResolvedChain, Truncation};

/// Concurrent mapping from message identifier to cache entry.
#[derive(Debug, Default)]
pub struct ConversationCache {
    entries: Mutex<HashMap<MessageId, Arc<CacheEntry>>>,
}

impl ConversationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether an entry exists for `id` (populated or not).
    pub fn contains(&self, id: MessageId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Get the entry for `id`, creating an unpopulated one if absent.
    ///
    /// The map guard is held only for the lookup; populating happens on the
    /// returned entry, outside any lock.
    pub fn entry(&self, id: MessageId) -> Arc<CacheEntry> {
        Arc::clone(
            self.lock()
                .entry(id)
                .or_insert_with(|| Arc::new(CacheEntry::new())),
        )
    }

    /// Register a generated reply as a resolved chain node.
    ///
    /// Called after a generation turn completes, so the bot's own messages
    /// are part of future context without a round-trip to the store. If a
    /// concurrent resolver already populated the entry from the store, that
    /// result stands.
    pub fn register_reply(
        &self,
        id: MessageId,
        messages: Vec<ChainMessage>,
        parent_id: MessageId,
    ) {
        let entry = self.entry(id);
        entry.preset(NodeRecord {
            messages,
            parent_id: Some(parent_id),
            fetch_failed: false,
        });
    }

    /// Identifiers currently cached, unsorted.
    pub fn ids(&self) -> Vec<MessageId> {
        self.lock().keys().copied().collect()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<MessageId, Arc<CacheEntry>>> {
        // A poisoned guard only means a panic elsewhere; the map itself is
        // still consistent since every critical section is a plain insert,
        // lookup, or remove.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChainMessage;

    #[test]
    fn test_new_cache_is_empty() {
        let cache = ConversationCache::new();
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entry_is_created_once() {
        let cache = ConversationCache::new();
        let first = cache.entry(MessageId(1));
        let second = cache.entry(MessageId(1));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_register_reply_is_resolved_immediately() {
        let cache = ConversationCache::new();
        cache.register_reply(
            MessageId(10),
            vec![ChainMessage::assistant(vec![])],
            MessageId(5),
        );

        let entry = cache.entry(MessageId(10));
        let record = entry.get().expect("reply should be settled");
        assert_eq!(record.parent_id, Some(MessageId(5)));
        assert!(!record.fetch_failed);
    }

    #[test]
    fn test_register_reply_yields_to_existing_population() {
        let cache = ConversationCache::new();
        let entry = cache.entry(MessageId(10));
        entry.preset(NodeRecord {
            messages: vec![ChainMessage::user("from the store")],
            parent_id: None,
            fetch_failed: false,
        });

        cache.register_reply(MessageId(10), vec![], MessageId(5));

        let record = cache.entry(MessageId(10));
        let record = record.get().unwrap();
        assert_eq!(record.messages.len(), 1);
        assert_eq!(record.parent_id, None);
    }
}
