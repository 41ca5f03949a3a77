//! Chain resolution: walk parent links from a trigger to build context.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::cache::ConversationCache;
use crate::models::{ChainMessage, ContentPart, MessageId};
use crate::traits::Messenger;

/// Why a resolved chain stopped short of a natural root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    /// The configured depth limit was reached
    DepthLimit,
    /// A node fetch failed; everything above it is unreachable
    FetchFailed,
    /// A parent link looped back onto the walked chain
    CycleDetected,
}

/// The outcome of one `resolve` call.
#[derive(Debug, Clone)]
pub struct ResolvedChain {
    /// Messages from the trigger outward to the oldest ancestor reached
    pub messages: Vec<ChainMessage>,
    /// Why the walk stopped early, if it did
    pub truncation: Option<Truncation>,
    /// Warnings accumulated during resolution, for the reply's first chunk
    pub warnings: BTreeSet<String>,
}

impl ResolvedChain {
    /// Whether the chain stopped before a natural root.
    pub fn truncated(&self) -> bool {
        self.truncation.is_some()
    }
}

/// Walks parent links through the shared cache.
pub struct ChainResolver<M> {
    cache: Arc<ConversationCache>,
    messenger: Arc<M>,
    max_text: usize,
}

impl<M: Messenger> ChainResolver<M> {
    pub fn new(cache: Arc<ConversationCache>, messenger: Arc<M>, max_text: usize) -> Self {
        ChainResolver {
            cache,
            messenger,
            max_text,
        }
    }

    /// Resolve the conversation chain starting at `start`.
    ///
    /// Visits at most `max_depth` entries. Fetch failures never escape:
    /// they settle the failing entry and truncate the chain. The result is
    /// newest-first; reverse it for backends that expect oldest-first.
    pub async fn resolve(&self, start: MessageId, max_depth: usize) -> ResolvedChain {
        let mut messages = Vec::new();
        let mut warnings = BTreeSet::new();
        let mut truncation = None;
        // Platform identifiers make parent chains acyclic, but a buggy
        // upstream could still hand us a loop; truncate instead of spinning.
        let mut visited: HashSet<MessageId> = HashSet::new();
        let mut cursor = Some(start);

        while let Some(id) = cursor {
            if visited.len() >= max_depth {
                truncation = Some(Truncation::DepthLimit);
                break;
            }
            if !visited.insert(id) {
                tracing::warn!(id = %id, "parent chain loops back on itself");
                truncation = Some(Truncation::CycleDetected);
                break;
            }

            let entry = self.cache.entry(id);
            let messenger = Arc::clone(&self.messenger);
            let record = entry
                .get_or_fetch(|| async move { messenger.fetch_node(id).await })
                .await;

            if record.fetch_failed {
                truncation = Some(Truncation::FetchFailed);
                break;
            }
            for message in &record.messages {
                messages.push(self.clamp_text(message, &mut warnings));
            }
            cursor = record.parent_id;
        }

        match truncation {
            Some(Truncation::DepthLimit) | Some(Truncation::CycleDetected) => {
                warnings.insert(format!("⚠️ Only using the last {} messages", max_depth));
            }
            Some(Truncation::FetchFailed) => {
                warnings.insert("⚠️ Some earlier messages could not be read".to_string());
            }
            None => {}
        }

        ResolvedChain {
            messages,
            truncation,
            warnings,
        }
    }

    /// Clamp oversized text parts to `max_text` characters.
    fn clamp_text(&self, message: &ChainMessage, warnings: &mut BTreeSet<String>) -> ChainMessage {
        let parts = message
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } if text.chars().count() > self.max_text => {
                    warnings.insert(format!("⚠️ Max {} characters per message", self.max_text));
                    ContentPart::Text {
                        text: text.chars().take(self.max_text).collect(),
                    }
                }
                other => other.clone(),
            })
            .collect();
        ChainMessage {
            role: message.role,
            parts,
        }
    }
}
