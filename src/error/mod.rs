//! Error types for chain resolution, messenger calls, and backend streams.
//!
//! The taxonomy mirrors how failures propagate: fetch failures are
//! recoverable (they only shorten a resolved chain and never escape
//! `resolve`), while edit and backend failures end the generation turn with a
//! single terminal error after one forced failure notice.

use std::fmt;

/// Failure fetching a message node from the external store.
///
/// Always recoverable: chain resolution truncates silently instead of
/// surfacing this to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The message does not exist (or is no longer visible)
    NotFound,
    /// Transport-level failure talking to the message store
    Transport(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound => write!(f, "message not found"),
            FetchError::Transport(msg) => write!(f, "fetch transport error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// Failure of a single visible-message mutation (create, update, delete).
#[derive(Debug, Clone, PartialEq)]
pub enum EditError {
    /// The target output message no longer exists
    NotFound,
    /// Transport-level failure talking to the message store
    Transport(String),
    /// The platform rejected the mutation
    Rejected(String),
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::NotFound => write!(f, "output message not found"),
            EditError::Transport(msg) => write!(f, "edit transport error: {}", msg),
            EditError::Rejected(msg) => write!(f, "edit rejected: {}", msg),
        }
    }
}

impl std::error::Error for EditError {}

/// Failure of the inference backend stream.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Could not reach the backend or open the stream
    Connect(String),
    /// The stream carried data the adapter could not interpret
    Protocol(String),
    /// The backend reported an error mid-stream
    Reported {
        message: String,
        code: Option<String>,
    },
    /// A delta arrived with no open part, or for a part of the wrong kind
    DeltaMismatch,
    /// The stream ended without a completion event
    Interrupted,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Connect(msg) => write!(f, "backend connect error: {}", msg),
            BackendError::Protocol(msg) => write!(f, "backend protocol error: {}", msg),
            BackendError::Reported { message, code } => match code {
                Some(code) => write!(f, "backend error ({}): {}", code, message),
                None => write!(f, "backend error: {}", message),
            },
            BackendError::DeltaMismatch => {
                write!(f, "content delta does not match the open part")
            }
            BackendError::Interrupted => write!(f, "stream ended before completion"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Terminal error for one generation turn.
#[derive(Debug)]
pub enum TurnError {
    /// A visible-message mutation failed
    Edit(EditError),
    /// The inference stream failed or terminated abnormally
    Backend(BackendError),
}

impl TurnError {
    /// The generic notice shown to the end user when a turn fails.
    pub fn user_notice() -> &'static str {
        "An error occurred while generating response"
    }
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::Edit(e) => write!(f, "edit failure: {}", e),
            TurnError::Backend(e) => write!(f, "backend failure: {}", e),
        }
    }
}

impl std::error::Error for TurnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TurnError::Edit(e) => Some(e),
            TurnError::Backend(e) => Some(e),
        }
    }
}

impl From<EditError> for TurnError {
    fn from(e: EditError) -> Self {
        TurnError::Edit(e)
    }
}

impl From<BackendError> for TurnError {
    fn from(e: BackendError) -> Self {
        TurnError::Backend(e)
    }
}
