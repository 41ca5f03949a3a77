//! Streaming-response reconciliation.
//!
//! Consumes the backend's ordered delta events, renders the accumulated
//! content, paginates it to the platform's message-size cap, and reconciles
//! the result against the currently visible reply messages under an
//! edit-rate limit.
//!
//! # Module structure
//! - `events` - delta event types consumed from the backend
//! - `pagination` - chunking and the three-way output diff
//! - `rate_gate` - edit-delay and in-flight-edit gating
//! - `reconciler` - the per-turn state machine driving it all

mod events;
mod pagination;
mod rate_gate;
mod reconciler;

pub use events::{PartDelta, StreamEvent};
pub use pagination::{diff_chunks, paginate, ChunkAction, STREAMING_INDICATOR};
pub use rate_gate::RateGate;
pub use reconciler::{OutputMessage, StreamReconciler, TurnOutput};
