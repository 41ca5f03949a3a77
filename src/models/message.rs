//! Chain message and content part types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Platform-assigned message identifier.
///
/// Identifiers are monotonically increasing in creation order, which the
/// cache evictor relies on as an age proxy and the chain resolver relies on
/// for acyclicity of parent links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(raw: u64) -> Self {
        MessageId(raw)
    }
}

/// Role of a message in a conversation chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One content part of a chain message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text content
    Text { text: String },
    /// A tool invocation made by the assistant
    ToolCall {
        tool_name: String,
        #[serde(default)]
        arguments: String,
    },
}

impl ContentPart {
    /// Create an empty text part, ready to receive deltas.
    pub fn empty_text() -> Self {
        ContentPart::Text {
            text: String::new(),
        }
    }

    /// Create a text part from a string.
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Render this part for display, or `None` if it renders as nothing.
    ///
    /// Tool calls render as a short marker referencing the tool name; empty
    /// text parts render as nothing.
    pub fn render(&self) -> Option<String> {
        match self {
            ContentPart::Text { text } if text.is_empty() => None,
            ContentPart::Text { text } => Some(text.clone()),
            ContentPart::ToolCall { tool_name, .. } => {
                Some(format!("-# Using tool `{}`", tool_name))
            }
        }
    }
}

/// A message in a resolved conversation chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainMessage {
    /// Role of the message author
    pub role: Role,
    /// Ordered content parts
    pub parts: Vec<ContentPart>,
}

impl ChainMessage {
    /// Create a user message holding a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        ChainMessage {
            role: Role::User,
            parts: vec![ContentPart::text(text)],
        }
    }

    /// Create an assistant message from content parts.
    pub fn assistant(parts: Vec<ContentPart>) -> Self {
        ChainMessage {
            role: Role::Assistant,
            parts,
        }
    }

    /// Concatenate the text parts of this message, skipping tool calls.
    pub fn plain_text(&self) -> String {
        let mut out = Vec::new();
        for part in &self.parts {
            if let ContentPart::Text { text } = part {
                if !text.is_empty() {
                    out.push(text.as_str());
                }
            }
        }
        out.join("\n\n")
    }
}
