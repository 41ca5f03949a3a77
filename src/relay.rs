//! Per-trigger turn orchestration.
//!
//! One logical task per inbound trigger: resolve the conversation chain
//! through the shared cache, stream the backend's response through the
//! reconciler, register the reply as new chain nodes, then trim the cache.

use std::sync::Arc;

use crate::cache::{ChainResolver, ConversationCache};
use crate::config::Config;
use crate::error::TurnError;
use crate::models::MessageId;
use crate::stream::{StreamReconciler, TurnOutput};
use crate::traits::{InferenceBackend, Messenger};

/// The relay: shared cache plus the two collaborator seams.
pub struct Relay<M, B> {
    config: Config,
    cache: Arc<ConversationCache>,
    messenger: Arc<M>,
    backend: B,
}

impl<M: Messenger, B: InferenceBackend> Relay<M, B> {
    pub fn new(config: Config, messenger: Arc<M>, backend: B) -> Self {
        Relay {
            config,
            cache: Arc::new(ConversationCache::new()),
            messenger,
            backend,
        }
    }

    /// The process-lifetime conversation cache.
    pub fn cache(&self) -> &Arc<ConversationCache> {
        &self.cache
    }

    /// Run one full generation turn for an inbound trigger message.
    ///
    /// Chain resolution failures only shorten the context. A backend or
    /// edit failure surfaces here as the turn's single terminal error,
    /// after the reconciler has posted its failure notice.
    pub async fn handle_trigger(&self, trigger: MessageId) -> Result<TurnOutput, TurnError> {
        let resolver = ChainResolver::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.messenger),
            self.config.max_text,
        );
        let chain = resolver.resolve(trigger, self.config.max_depth).await;
        tracing::info!(
            trigger = %trigger,
            messages = chain.messages.len(),
            truncated = chain.truncated(),
            "handling trigger"
        );

        // resolve() returns newest-first; the backend wants oldest-first
        let mut history = chain.messages;
        history.reverse();

        let reconciler = StreamReconciler::new(
            Arc::clone(&self.messenger),
            trigger,
            self.config.max_message_length,
            self.config.edit_delay(),
            chain.warnings,
        );

        let result = match self.backend.stream_response(&history).await {
            Ok(events) => reconciler.run(events).await,
            Err(err) => Err(reconciler.fail_backend(err).await),
        };

        match &result {
            Ok(output) => {
                // The reply becomes chain context for future triggers
                for id in &output.output_ids {
                    self.cache
                        .register_reply(*id, output.messages.clone(), trigger);
                }
                tracing::info!(
                    trigger = %trigger,
                    outputs = output.output_ids.len(),
                    chars = output.final_text.chars().count(),
                    "turn complete"
                );
            }
            Err(err) => {
                tracing::error!(trigger = %trigger, error = %err, "turn failed");
            }
        }

        let evicted = self.cache.evict_to_bound(self.config.max_cached_nodes);
        if evicted > 0 {
            tracing::debug!(evicted, "evicted cache entries");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::ScriptedBackend;
    use crate::adapters::MemoryMessenger;
    use crate::error::BackendError;

    fn relay(
        messenger: Arc<MemoryMessenger>,
        backend: ScriptedBackend,
    ) -> Relay<MemoryMessenger, ScriptedBackend> {
        let config = Config {
            edit_delay_ms: 0,
            ..Config::default()
        };
        Relay::new(config, messenger, backend)
    }

    #[tokio::test]
    async fn test_turn_streams_reply_and_registers_nodes() {
        let messenger = Arc::new(MemoryMessenger::new());
        let trigger = messenger.seed_user("What is Rust?", None);

        let backend = ScriptedBackend::new();
        backend.push_script(ScriptedBackend::streaming_text(&[
            "Rust is ",
            "a systems language.",
        ]));

        let relay = relay(Arc::clone(&messenger), backend);
        let output = relay.handle_trigger(trigger).await.unwrap();

        assert_eq!(output.final_text, "Rust is a systems language.");
        assert_eq!(output.output_ids.len(), 1);
        let reply_id = output.output_ids[0];
        assert_eq!(
            messenger.message_text(reply_id),
            Some("Rust is a systems language.".to_string())
        );
        // The reply is now a cached chain node parented to the trigger
        let entry = relay.cache().entry(reply_id);
        let record = entry.get().expect("reply node registered");
        assert_eq!(record.parent_id, Some(trigger));
    }

    #[tokio::test]
    async fn test_turn_sends_history_oldest_first() {
        let messenger = Arc::new(MemoryMessenger::new());
        let root = messenger.seed_user("first", None);
        let trigger = messenger.seed_user("second", Some(root));

        let backend = ScriptedBackend::new();
        backend.push_script(ScriptedBackend::streaming_text(&["ok"]));

        let relay = relay(Arc::clone(&messenger), backend);
        relay.handle_trigger(trigger).await.unwrap();

        let history = relay.backend.last_history().unwrap();
        let texts: Vec<String> = history.iter().map(|m| m.plain_text()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_backend_connect_failure_posts_notice() {
        let messenger = Arc::new(MemoryMessenger::new());
        let trigger = messenger.seed_user("hello", None);

        // No script queued: stream_response fails to open
        let relay = relay(Arc::clone(&messenger), ScriptedBackend::new());
        let err = relay.handle_trigger(trigger).await.unwrap_err();

        assert!(matches!(err, TurnError::Backend(BackendError::Connect(_))));
        assert_eq!(messenger.created_count(), 1);
        let calls = messenger.calls();
        match &calls[0] {
            crate::adapters::MessengerCall::Create { text, .. } => {
                assert_eq!(text, TurnError::user_notice());
            }
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_turn_enforces_cache_bound() {
        let messenger = Arc::new(MemoryMessenger::new());
        let mut parent = None;
        let mut tip = MessageId(0);
        for i in 0..20 {
            tip = messenger.seed_user(format!("msg {}", i), parent);
            parent = Some(tip);
        }

        let backend = ScriptedBackend::new();
        backend.push_script(ScriptedBackend::streaming_text(&["reply"]));

        let config = Config {
            edit_delay_ms: 0,
            max_cached_nodes: 10,
            ..Config::default()
        };
        let relay = Relay::new(config, Arc::clone(&messenger), backend);
        relay.handle_trigger(tip).await.unwrap();

        assert!(relay.cache().len() <= 10);
    }
}
