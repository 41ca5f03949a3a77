//! Delta event types consumed from the inference backend.

use crate::error::BackendError;
use crate::models::ContentPart;

/// An incremental mutation of the current open content part.
#[derive(Debug, Clone, PartialEq)]
pub enum PartDelta {
    /// Append text to an open text part
    Text(String),
    /// Append to the argument payload of an open tool-call part
    ToolCallArguments(String),
}

impl PartDelta {
    /// Apply this delta to the open part in place.
    ///
    /// A delta of the wrong kind for the part is a backend protocol
    /// violation and fails the turn.
    pub fn apply(&self, part: &mut ContentPart) -> Result<(), BackendError> {
        match (self, part) {
            (PartDelta::Text(chunk), ContentPart::Text { text }) => {
                text.push_str(chunk);
                Ok(())
            }
            (PartDelta::ToolCallArguments(chunk), ContentPart::ToolCall { arguments, .. }) => {
                arguments.push_str(chunk);
                Ok(())
            }
            _ => Err(BackendError::DeltaMismatch),
        }
    }
}

/// Ordered events of one generation stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A new content part begins; any open part is finalized first
    PartStart(ContentPart),
    /// Incremental change to the current open part
    PartDelta(PartDelta),
    /// The stream finished normally
    Complete,
    /// The backend reported an error mid-stream
    Error {
        message: String,
        code: Option<String>,
    },
}

impl StreamEvent {
    /// Event type name for log lines.
    pub fn event_type_name(&self) -> &'static str {
        match self {
            StreamEvent::PartStart(_) => "part_start",
            StreamEvent::PartDelta(_) => "part_delta",
            StreamEvent::Complete => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }
}
