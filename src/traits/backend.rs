//! Inference-backend trait abstraction.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::BackendError;
use crate::models::ChainMessage;
use crate::stream::StreamEvent;

/// Ordered stream of content delta events from the backend.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, BackendError>> + Send>>;

/// Trait for the inference collaborator.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Open a generation stream for the given conversation history.
    ///
    /// `history` is in oldest-first order, ending with the triggering
    /// message.
    async fn stream_response(&self, history: &[ChainMessage]) -> Result<EventStream, BackendError>;
}
