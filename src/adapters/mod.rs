//! Concrete implementations of the collaborator traits.
//!
//! # Adapters
//!
//! - [`MemoryMessenger`] - in-memory message store with platform-style
//!   monotonic identifiers; used by the demo binary and by tests
//! - [`OpenAiBackend`] - OpenAI-compatible chat-completions streaming over
//!   SSE
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles:
//! - [`mock::ScriptedBackend`] - emits canned event sequences

pub mod memory;
pub mod mock;
pub mod sse_backend;

pub use memory::{MemoryMessenger, MessengerCall, StoredMessage};
pub use sse_backend::OpenAiBackend;
