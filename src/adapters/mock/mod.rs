//! Mock implementations for testing.
//!
//! [`MemoryMessenger`](crate::adapters::MemoryMessenger) already serves as
//! the messenger test double; this module holds the doubles that have no
//! production counterpart.

pub mod backend;

pub use backend::ScriptedBackend;
