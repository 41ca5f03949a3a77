//! The per-turn streaming reconciler state machine.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{pin_mut, Stream, StreamExt};

use crate::error::{BackendError, EditError, TurnError};
use crate::models::{ChainMessage, ContentPart, MessageId};
use crate::traits::Messenger;

use super::pagination::{diff_chunks, paginate, ChunkAction, STREAMING_INDICATOR};
use super::rate_gate::RateGate;
use super::StreamEvent;

/// A reply message currently visible on the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputMessage {
    /// Platform identifier of the visible message
    pub id: MessageId,
    /// Position in the paginated sequence
    pub index: usize,
    /// The chunk this message currently displays
    pub text: String,
}

/// Result of a completed generation turn.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    /// Final rendered text, without the streaming indicator
    pub final_text: String,
    /// Identifiers of the visible reply messages, in order
    pub output_ids: Vec<MessageId>,
    /// The assistant's finalized messages, for cache registration
    pub messages: Vec<ChainMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Streaming,
    Finalizing,
    Done,
    Failed,
}

/// Consumes one backend event stream and reconciles the rendered content
/// into visible reply messages.
///
/// State is private to the turn; nothing here is shared across turns.
pub struct StreamReconciler<M> {
    messenger: Arc<M>,
    trigger_id: MessageId,
    chunk_limit: usize,
    finalized: Vec<ContentPart>,
    open: Option<ContentPart>,
    warnings: BTreeSet<String>,
    last_rendered: String,
    outputs: Vec<OutputMessage>,
    gate: RateGate,
    phase: Phase,
}

impl<M: Messenger> StreamReconciler<M> {
    /// Create a reconciler for one generation turn.
    ///
    /// `max_message_length` is the platform cap; space for the streaming
    /// indicator is reserved out of it. `warnings` were accumulated during
    /// chain resolution and ride on the first chunk.
    pub fn new(
        messenger: Arc<M>,
        trigger_id: MessageId,
        max_message_length: usize,
        edit_delay: Duration,
        warnings: BTreeSet<String>,
    ) -> Self {
        let indicator_len = STREAMING_INDICATOR.chars().count();
        StreamReconciler {
            messenger,
            trigger_id,
            chunk_limit: max_message_length.saturating_sub(indicator_len).max(1),
            finalized: Vec::new(),
            open: None,
            warnings,
            last_rendered: String::new(),
            outputs: Vec::new(),
            gate: RateGate::new(edit_delay),
            phase: Phase::Idle,
        }
    }

    /// Drive the turn to completion.
    ///
    /// Consumes the event stream in order, flushing after every event. Any
    /// edit or backend failure ends the turn with a single forced failure
    /// notice and a terminal error.
    pub async fn run<S>(mut self, events: S) -> Result<TurnOutput, TurnError>
    where
        S: Stream<Item = Result<StreamEvent, BackendError>>,
    {
        pin_mut!(events);
        self.set_phase(Phase::Streaming);
        let mut completed = false;

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(err) => return Err(self.fail_backend(err).await),
            };
            tracing::trace!(event = event.event_type_name(), "stream event");

            match event {
                StreamEvent::PartStart(part) => {
                    if let Some(open) = self.open.take() {
                        self.finalized.push(open);
                    }
                    self.open = Some(part);
                }
                StreamEvent::PartDelta(delta) => {
                    let part = match self.open.as_mut() {
                        Some(part) => part,
                        None => return Err(self.fail_backend(BackendError::DeltaMismatch).await),
                    };
                    if let Err(err) = delta.apply(part) {
                        return Err(self.fail_backend(err).await);
                    }
                }
                StreamEvent::Complete => {
                    completed = true;
                    break;
                }
                StreamEvent::Error { message, code } => {
                    let err = BackendError::Reported { message, code };
                    return Err(self.fail_backend(err).await);
                }
            }

            let text = self.render(true);
            if let Err(err) = self.flush(&text, false, false).await {
                return Err(self.fail_edit(err).await);
            }
        }

        if !completed {
            return Err(self.fail_backend(BackendError::Interrupted).await);
        }

        self.set_phase(Phase::Finalizing);
        if let Some(open) = self.open.take() {
            self.finalized.push(open);
        }
        let final_text = self.render(false);
        if let Err(err) = self.flush(&final_text, true, true).await {
            return Err(self.fail_edit(err).await);
        }
        // Drain the terminal edit so its outcome belongs to this turn
        if let Err(err) = self.gate.wait_in_flight().await {
            return Err(self.fail_edit(err).await);
        }
        self.set_phase(Phase::Done);

        Ok(TurnOutput {
            final_text,
            output_ids: self.outputs.iter().map(|o| o.id).collect(),
            messages: vec![ChainMessage::assistant(self.finalized.clone())],
        })
    }

    /// Abort the turn before or during streaming with a backend error.
    ///
    /// Used by callers when opening the stream itself fails; issues the
    /// same single forced failure notice as a mid-stream failure.
    pub async fn fail_backend(mut self, err: BackendError) -> TurnError {
        self.post_failure_notice().await;
        TurnError::Backend(err)
    }

    async fn fail_edit(mut self, err: EditError) -> TurnError {
        self.post_failure_notice().await;
        TurnError::Edit(err)
    }

    /// Best-effort forced flush replacing visible content with a generic
    /// failure notice. No rollback of already-applied chunks is attempted.
    async fn post_failure_notice(&mut self) {
        self.set_phase(Phase::Failed);
        let notice = TurnError::user_notice().to_string();
        if let Err(err) = self.flush(&notice, true, true).await {
            tracing::warn!(error = %err, "failed to post failure notice");
            return;
        }
        if let Err(err) = self.gate.wait_in_flight().await {
            tracing::warn!(error = %err, "failure notice edit did not apply");
        }
    }

    /// Full rendered text: finalized parts then the open part, with the
    /// streaming indicator appended while incomplete.
    fn render(&self, streaming: bool) -> String {
        let mut rendered: Vec<String> = Vec::new();
        for part in &self.finalized {
            if let Some(text) = part.render() {
                rendered.push(text);
            }
        }
        if let Some(open) = &self.open {
            if let Some(text) = open.render() {
                rendered.push(text);
            }
        }
        let mut text = rendered.join("\n\n");
        if streaming {
            text.push_str(STREAMING_INDICATOR);
        }
        text
    }

    /// Paginate `full_text`, diff against the visible outputs, and execute
    /// the resulting actions through the rate gate.
    async fn flush(&mut self, full_text: &str, complete: bool, forced: bool) -> Result<(), EditError> {
        if !complete && full_text == self.last_rendered {
            return Ok(());
        }

        let chunks = paginate(full_text, self.chunk_limit);
        let actions = diff_chunks(&chunks, &self.outputs);

        for action in actions {
            match action {
                ChunkAction::Create { index, text } => {
                    self.gate.wait_in_flight().await?;
                    let reply_to = self
                        .outputs
                        .last()
                        .map(|o| o.id)
                        .unwrap_or(self.trigger_id);
                    let warnings = if index == 0 {
                        self.warnings.iter().cloned().collect()
                    } else {
                        Vec::new()
                    };
                    let id = self
                        .messenger
                        .create_reply(reply_to, text.clone(), warnings)
                        .await?;
                    self.outputs.push(OutputMessage { id, index, text });
                }
                ChunkAction::Update { index, id, text } => {
                    // Gated: skipped this event, retried on the next one or
                    // on the terminal forced flush
                    if !self.gate.permits(complete, forced) {
                        continue;
                    }
                    self.gate.wait_in_flight().await?;
                    self.outputs[index].text = text.clone();
                    let messenger = Arc::clone(&self.messenger);
                    self.gate
                        .begin_edit(tokio::spawn(async move { messenger.update(id, text).await }));
                }
                ChunkAction::Delete { id, .. } => {
                    self.gate.wait_in_flight().await?;
                    self.messenger.delete(id).await?;
                    self.outputs.retain(|o| o.id != id);
                }
                ChunkAction::Skip { .. } => {}
            }
        }

        self.last_rendered = full_text.to_string();
        Ok(())
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::debug!(from = ?self.phase, to = ?phase, "reconciler phase");
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryMessenger;

    fn reconciler(
        messenger: Arc<MemoryMessenger>,
        max_len: usize,
    ) -> StreamReconciler<MemoryMessenger> {
        StreamReconciler::new(
            messenger,
            MessageId(1),
            max_len,
            Duration::from_millis(0),
            BTreeSet::new(),
        )
    }

    #[test]
    fn test_render_joins_parts_with_blank_line() {
        let messenger = Arc::new(MemoryMessenger::new());
        let mut r = reconciler(messenger, 4096);
        r.finalized.push(ContentPart::text("one"));
        r.finalized.push(ContentPart::ToolCall {
            tool_name: "search".to_string(),
            arguments: String::new(),
        });
        r.open = Some(ContentPart::text("two"));
        assert_eq!(r.render(false), "one\n\n-# Using tool `search`\n\ntwo");
    }

    #[test]
    fn test_render_streaming_appends_indicator() {
        let messenger = Arc::new(MemoryMessenger::new());
        let mut r = reconciler(messenger, 4096);
        r.open = Some(ContentPart::text("partial"));
        assert_eq!(r.render(true), format!("partial{}", STREAMING_INDICATOR));
    }

    #[test]
    fn test_render_empty_open_part_is_only_indicator() {
        let messenger = Arc::new(MemoryMessenger::new());
        let mut r = reconciler(messenger, 4096);
        r.open = Some(ContentPart::empty_text());
        assert_eq!(r.render(true), STREAMING_INDICATOR);
    }

    #[test]
    fn test_chunk_limit_reserves_indicator_space() {
        let messenger = Arc::new(MemoryMessenger::new());
        let r = reconciler(messenger, 2000);
        let indicator_len = STREAMING_INDICATOR.chars().count();
        assert_eq!(r.chunk_limit, 2000 - indicator_len);
    }

    #[tokio::test]
    async fn test_flush_creates_single_message_for_short_text() {
        let messenger = Arc::new(MemoryMessenger::new());
        let mut r = reconciler(Arc::clone(&messenger), 2000);

        r.flush("Hello", true, true).await.unwrap();

        assert_eq!(r.outputs.len(), 1);
        assert_eq!(messenger.created_count(), 1);
        assert_eq!(messenger.updated_count(), 0);
        assert_eq!(messenger.deleted_count(), 0);
    }

    #[tokio::test]
    async fn test_flush_same_text_is_noop() {
        let messenger = Arc::new(MemoryMessenger::new());
        let mut r = reconciler(Arc::clone(&messenger), 2000);

        r.flush("Hello", false, false).await.unwrap();
        r.flush("Hello", false, false).await.unwrap();

        assert_eq!(messenger.created_count(), 1);
        assert_eq!(messenger.updated_count(), 0);
    }
}
