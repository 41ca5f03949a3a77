//! Domain models shared across the cache and streaming subsystems.

mod message;

pub use message::{ChainMessage, ContentPart, MessageId, Role};
