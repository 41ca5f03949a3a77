//! Bounded-size eviction for the conversation cache.

use super::ConversationCache;
use crate::models::MessageId;

impl ConversationCache {
    /// Evict the lowest-identifier entries until at most `bound` remain.
    ///
    /// Identifiers are platform-assigned in creation order, so lowest-first
    /// approximates least-recently-created without tracking access times.
    /// An entry whose populate is still in flight is skipped. Returns the
    /// number of entries removed.
    pub fn evict_to_bound(&self, bound: usize) -> usize {
        let mut entries = self.lock();
        if entries.len() <= bound {
            return 0;
        }
        let overflow = entries.len() - bound;

        let mut ids: Vec<MessageId> = entries.keys().copied().collect();
        ids.sort();

        let mut removed = 0;
        for id in ids {
            if removed == overflow {
                break;
            }
            let settled = entries.get(&id).map(|e| e.is_settled()).unwrap_or(false);
            if !settled {
                continue;
            }
            entries.remove(&id);
            removed += 1;
        }
        removed
    }
}
