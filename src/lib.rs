//! Longwave - relay between chat platforms and streaming LLM backends
//!
//! Reconstructs conversation context from parent-linked messages through a
//! shared single-flight cache, and reconciles the backend's streamed output
//! into a bounded, rate-limited set of visible reply messages.

pub mod adapters;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod relay;
pub mod stream;
pub mod traits;
