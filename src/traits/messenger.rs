//! Messaging-platform trait abstraction.

use async_trait::async_trait;

use crate::error::{EditError, FetchError};
use crate::models::{ChainMessage, MessageId};

/// A message node fetched from the external store.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedNode {
    /// The node's content, in conversation order
    pub messages: Vec<ChainMessage>,
    /// The message this one replies to, if any
    pub parent_id: Option<MessageId>,
}

/// Trait for the messaging-platform collaborator.
///
/// `fetch_node` must be safe for concurrent invocation across distinct
/// identifiers; the cache guarantees it is called at most once per
/// identifier. The mutation methods are independently fallible; the relay
/// never retries them.
#[async_trait]
pub trait Messenger: Send + Sync + 'static {
    /// Fetch one message node (content plus parent link).
    async fn fetch_node(&self, id: MessageId) -> Result<FetchedNode, FetchError>;

    /// Create a visible reply to `reply_to` and return its identifier.
    ///
    /// `warnings` accompany only the first chunk of a reply; how they are
    /// displayed is up to the platform adapter.
    async fn create_reply(
        &self,
        reply_to: MessageId,
        text: String,
        warnings: Vec<String>,
    ) -> Result<MessageId, EditError>;

    /// Replace the text of an existing visible message.
    async fn update(&self, id: MessageId, text: String) -> Result<(), EditError>;

    /// Delete a visible message.
    async fn delete(&self, id: MessageId) -> Result<(), EditError>;
}
