//! In-memory messenger adapter.
//!
//! Stores messages in process memory and assigns monotonically increasing
//! identifiers the way a chat platform would. Doubles as the test
//! messenger: every mutation is recorded, failures can be injected, and
//! call concurrency is tracked so tests can assert the single-in-flight
//! property.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{EditError, FetchError};
use crate::models::{ChainMessage, MessageId, Role};
use crate::traits::{FetchedNode, Messenger};

/// A message held in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub parent_id: Option<MessageId>,
    pub warnings: Vec<String>,
}

/// One recorded mutation call.
#[derive(Debug, Clone, PartialEq)]
pub enum MessengerCall {
    Create {
        id: MessageId,
        reply_to: MessageId,
        text: String,
        warnings: Vec<String>,
    },
    Update {
        id: MessageId,
        text: String,
    },
    Delete {
        id: MessageId,
    },
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    messages: BTreeMap<MessageId, StoredMessage>,
    calls: Vec<MessengerCall>,
    fetch_counts: HashMap<MessageId, usize>,
    fail_creates: bool,
    fail_updates: bool,
    fail_deletes: bool,
    fetch_delay: Option<Duration>,
    op_delay: Option<Duration>,
}

/// In-memory message store implementing [`Messenger`].
#[derive(Debug, Default)]
pub struct MemoryMessenger {
    inner: Mutex<Inner>,
    active_calls: AtomicUsize,
    max_concurrent_calls: AtomicUsize,
}

impl MemoryMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a user message, returning its identifier.
    pub fn seed_user(&self, text: impl Into<String>, parent_id: Option<MessageId>) -> MessageId {
        self.seed(Role::User, text.into(), parent_id)
    }

    /// Store an assistant message, returning its identifier.
    pub fn seed_assistant(
        &self,
        text: impl Into<String>,
        parent_id: Option<MessageId>,
    ) -> MessageId {
        self.seed(Role::Assistant, text.into(), parent_id)
    }

    fn seed(&self, role: Role, text: String, parent_id: Option<MessageId>) -> MessageId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = MessageId(inner.next_id);
        inner.messages.insert(
            id,
            StoredMessage {
                id,
                role,
                text,
                parent_id,
                warnings: Vec::new(),
            },
        );
        id
    }

    /// Rewrite a stored message's parent link.
    pub fn set_parent(&self, id: MessageId, parent_id: Option<MessageId>) {
        if let Some(message) = self.lock().messages.get_mut(&id) {
            message.parent_id = parent_id;
        }
    }

    /// How often `fetch_node` was called for `id`.
    pub fn fetch_count(&self, id: MessageId) -> usize {
        self.lock().fetch_counts.get(&id).copied().unwrap_or(0)
    }

    /// All recorded mutation calls, in order.
    pub fn calls(&self) -> Vec<MessengerCall> {
        self.lock().calls.clone()
    }

    pub fn created_count(&self) -> usize {
        self.count_calls(|c| matches!(c, MessengerCall::Create { .. }))
    }

    pub fn updated_count(&self) -> usize {
        self.count_calls(|c| matches!(c, MessengerCall::Update { .. }))
    }

    pub fn deleted_count(&self) -> usize {
        self.count_calls(|c| matches!(c, MessengerCall::Delete { .. }))
    }

    fn count_calls(&self, pred: impl Fn(&MessengerCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Current text of a stored message.
    pub fn message_text(&self, id: MessageId) -> Option<String> {
        self.lock().messages.get(&id).map(|m| m.text.clone())
    }

    /// A stored message, if present.
    pub fn message(&self, id: MessageId) -> Option<StoredMessage> {
        self.lock().messages.get(&id).cloned()
    }

    /// Peak number of mutation calls observed running concurrently.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls.load(Ordering::SeqCst)
    }

    /// Inject latency into `fetch_node`, widening race windows in tests.
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.lock().fetch_delay = Some(delay);
    }

    /// Inject latency into every mutation call.
    pub fn set_op_delay(&self, delay: Duration) {
        self.lock().op_delay = Some(delay);
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.lock().fail_creates = fail;
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.lock().fail_updates = fail;
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin_call(&self) -> CallGuard<'_> {
        let active = self.active_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_calls.fetch_max(active, Ordering::SeqCst);
        CallGuard { owner: self }
    }

    async fn op_pause(&self) {
        let delay = self.lock().op_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

struct CallGuard<'a> {
    owner: &'a MemoryMessenger,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.owner.active_calls.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Messenger for MemoryMessenger {
    async fn fetch_node(&self, id: MessageId) -> Result<FetchedNode, FetchError> {
        let delay = {
            let mut inner = self.lock();
            *inner.fetch_counts.entry(id).or_insert(0) += 1;
            inner.fetch_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let inner = self.lock();
        let message = inner.messages.get(&id).ok_or(FetchError::NotFound)?;
        let chain_message = match message.role {
            Role::User => ChainMessage::user(message.text.clone()),
            Role::Assistant => {
                ChainMessage::assistant(vec![crate::models::ContentPart::text(
                    message.text.clone(),
                )])
            }
        };
        Ok(FetchedNode {
            messages: vec![chain_message],
            parent_id: message.parent_id,
        })
    }

    async fn create_reply(
        &self,
        reply_to: MessageId,
        text: String,
        warnings: Vec<String>,
    ) -> Result<MessageId, EditError> {
        let _guard = self.begin_call();
        self.op_pause().await;

        let mut inner = self.lock();
        if inner.fail_creates {
            return Err(EditError::Rejected("create disabled".to_string()));
        }
        inner.next_id += 1;
        let id = MessageId(inner.next_id);
        inner.messages.insert(
            id,
            StoredMessage {
                id,
                role: Role::Assistant,
                text: text.clone(),
                parent_id: Some(reply_to),
                warnings: warnings.clone(),
            },
        );
        inner.calls.push(MessengerCall::Create {
            id,
            reply_to,
            text,
            warnings,
        });
        Ok(id)
    }

    async fn update(&self, id: MessageId, text: String) -> Result<(), EditError> {
        let _guard = self.begin_call();
        self.op_pause().await;

        let mut inner = self.lock();
        if inner.fail_updates {
            return Err(EditError::Rejected("update disabled".to_string()));
        }
        match inner.messages.get_mut(&id) {
            Some(message) => {
                message.text = text.clone();
            }
            None => return Err(EditError::NotFound),
        }
        inner.calls.push(MessengerCall::Update { id, text });
        Ok(())
    }

    async fn delete(&self, id: MessageId) -> Result<(), EditError> {
        let _guard = self.begin_call();
        self.op_pause().await;

        let mut inner = self.lock();
        if inner.fail_deletes {
            return Err(EditError::Rejected("delete disabled".to_string()));
        }
        if inner.messages.remove(&id).is_none() {
            return Err(EditError::NotFound);
        }
        inner.calls.push(MessengerCall::Delete { id });
        Ok(())
    }
}
