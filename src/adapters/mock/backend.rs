//! Scripted inference backend for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::error::BackendError;
use crate::models::{ChainMessage, ContentPart};
use crate::stream::{PartDelta, StreamEvent};
use crate::traits::{EventStream, InferenceBackend};

/// Backend double that replays canned event scripts.
///
/// Each `stream_response` call consumes the next queued script; calling
/// with an empty queue is a connect error.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Vec<Result<StreamEvent, BackendError>>>>,
    last_history: Mutex<Option<Vec<ChainMessage>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the next `stream_response` call.
    pub fn push_script(&self, events: Vec<Result<StreamEvent, BackendError>>) {
        self.lock_scripts().push_back(events);
    }

    /// Build a well-formed script that streams `chunks` as one text part.
    pub fn streaming_text(chunks: &[&str]) -> Vec<Result<StreamEvent, BackendError>> {
        let mut events = vec![Ok(StreamEvent::PartStart(ContentPart::empty_text()))];
        for chunk in chunks {
            events.push(Ok(StreamEvent::PartDelta(PartDelta::Text(
                chunk.to_string(),
            ))));
        }
        events.push(Ok(StreamEvent::Complete));
        events
    }

    /// The history passed to the most recent `stream_response` call.
    pub fn last_history(&self) -> Option<Vec<ChainMessage>> {
        self.last_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_scripts(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Vec<Result<StreamEvent, BackendError>>>> {
        self.scripts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn stream_response(&self, history: &[ChainMessage]) -> Result<EventStream, BackendError> {
        *self
            .last_history
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(history.to_vec());

        let script = self
            .lock_scripts()
            .pop_front()
            .ok_or_else(|| BackendError::Connect("no scripted response queued".to_string()))?;
        Ok(Box::pin(stream::iter(script)))
    }
}
