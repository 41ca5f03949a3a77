//! Trait abstractions at the collaborator boundaries.
//!
//! The relay talks to two external systems: a messaging platform (message
//! fetches and visible-message mutations) and an inference backend (an
//! ordered stream of content delta events). Both seams are traits so
//! production adapters and test doubles are interchangeable.

mod backend;
mod messenger;

pub use backend::{EventStream, InferenceBackend};
pub use messenger::{FetchedNode, Messenger};
