//! Pagination of rendered text and the output-message diff.

use crate::models::MessageId;

use super::reconciler::OutputMessage;

/// Glyph appended to the last chunk while a response is still streaming.
pub const STREAMING_INDICATOR: &str = " ⚪";

/// Split `text` into ordered chunks of at most `limit` characters.
///
/// Splits at hard character boundaries (chars, never inside a UTF-8
/// sequence). Empty text yields zero chunks; concatenating the chunks in
/// order reconstructs the input exactly.
pub fn paginate(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == limit {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// One reconciliation step for a paginated position.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkAction {
    /// A chunk with no visible message yet
    Create { index: usize, text: String },
    /// A visible message whose text must change
    Update {
        index: usize,
        id: MessageId,
        text: String,
    },
    /// A visible message with no chunk left to display
    Delete { index: usize, id: MessageId },
    /// A visible message already displaying its chunk
    Skip { index: usize },
}

/// Position-wise diff of desired chunks against the visible output list.
pub fn diff_chunks(chunks: &[String], outputs: &[OutputMessage]) -> Vec<ChunkAction> {
    let len = chunks.len().max(outputs.len());
    let mut actions = Vec::with_capacity(len);

    for index in 0..len {
        match (chunks.get(index), outputs.get(index)) {
            (Some(chunk), None) => actions.push(ChunkAction::Create {
                index,
                text: chunk.clone(),
            }),
            (Some(chunk), Some(output)) => {
                if *chunk != output.text {
                    actions.push(ChunkAction::Update {
                        index,
                        id: output.id,
                        text: chunk.clone(),
                    });
                } else {
                    actions.push(ChunkAction::Skip { index });
                }
            }
            (None, Some(output)) => actions.push(ChunkAction::Delete {
                index,
                id: output.id,
            }),
            (None, None) => unreachable!("index bounded by max of both lengths"),
        }
    }
    actions
}
