//! A single cache entry with populate-once semantics.

use std::future::Future;

use tokio::sync::OnceCell;

use crate::error::FetchError;
use crate::models::{ChainMessage, MessageId};
use crate::traits::FetchedNode;

/// The settled state of a cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// Resolved content; empty when the fetch failed
    pub messages: Vec<ChainMessage>,
    /// Parent link, `None` at a chain root or on fetch failure
    pub parent_id: Option<MessageId>,
    /// Whether the one fetch for this entry failed
    pub fetch_failed: bool,
}

impl NodeRecord {
    fn failed() -> Self {
        NodeRecord {
            messages: Vec::new(),
            parent_id: None,
            fetch_failed: true,
        }
    }
}

/// One message node in the conversation cache.
///
/// The record is written at most once. The first caller of
/// [`CacheEntry::get_or_fetch`] runs the fetch; concurrent callers wait on
/// the cell and observe the settled record. If the populating task is
/// cancelled mid-fetch, one of the waiters takes over the fetch, so no
/// entry is ever stuck "populating" after its task exits.
#[derive(Debug, Default)]
pub struct CacheEntry {
    record: OnceCell<NodeRecord>,
}

impl CacheEntry {
    /// Create an unpopulated entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the entry has settled (fetched, failed, or preset).
    ///
    /// Entries are inserted at the moment their populate begins, so an
    /// unsettled entry means a populate is in flight; the evictor must not
    /// remove it.
    pub fn is_settled(&self) -> bool {
        self.record.initialized()
    }

    /// The settled record, if any.
    pub fn get(&self) -> Option<&NodeRecord> {
        self.record.get()
    }

    /// Settle the entry directly, without a fetch.
    ///
    /// Loses to a concurrent or earlier population; used when registering
    /// the bot's own replies, whose content is already in hand.
    pub fn preset(&self, record: NodeRecord) {
        let _ = self.record.set(record);
    }

    /// Get the record, fetching it if this entry is unpopulated.
    ///
    /// A failed fetch settles the entry with `fetch_failed` set; it is not
    /// retried later.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> &NodeRecord
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FetchedNode, FetchError>>,
    {
        self.record
            .get_or_init(|| async move {
                match fetch().await {
                    Ok(node) => NodeRecord {
                        messages: node.messages,
                        parent_id: node.parent_id,
                        fetch_failed: false,
                    },
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to fetch message node");
                        NodeRecord::failed()
                    }
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChainMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn node(text: &str, parent: Option<MessageId>) -> FetchedNode {
        FetchedNode {
            messages: vec![ChainMessage::user(text)],
            parent_id: parent,
        }
    }

    #[tokio::test]
    async fn test_fetch_populates_once() {
        let entry = CacheEntry::new();
        let calls = AtomicUsize::new(0);

        let record = entry
            .get_or_fetch(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(node("hello", Some(MessageId(1))))
            })
            .await;
        assert!(!record.fetch_failed);
        assert_eq!(record.parent_id, Some(MessageId(1)));

        // Second call must not fetch again
        let record = entry
            .get_or_fetch(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(node("other", None))
            })
            .await;
        assert_eq!(record.messages[0].plain_text(), "hello");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_settles_entry() {
        let entry = CacheEntry::new();

        let record = entry
            .get_or_fetch(|| async { Err(FetchError::NotFound) })
            .await;
        assert!(record.fetch_failed);
        assert!(record.messages.is_empty());
        assert!(entry.is_settled());

        // Failure is cached, not retried
        let record = entry
            .get_or_fetch(|| async { Ok(node("late", None)) })
            .await;
        assert!(record.fetch_failed);
    }

    #[tokio::test]
    async fn test_preset_loses_to_existing_record() {
        let entry = CacheEntry::new();
        entry
            .get_or_fetch(|| async { Ok(node("first", None)) })
            .await;

        entry.preset(NodeRecord {
            messages: vec![ChainMessage::user("second")],
            parent_id: None,
            fetch_failed: false,
        });

        assert_eq!(entry.get().unwrap().messages[0].plain_text(), "first");
    }

    #[test]
    fn test_new_entry_is_unsettled() {
        let entry = CacheEntry::new();
        assert!(!entry.is_settled());
        assert!(entry.get().is_none());
    }
}
