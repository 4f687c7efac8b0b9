//! Per-user chat session driver.
//!
//! Binds a [`ConversationManager`] to the context aggregator and the
//! orchestrator. The manager lock is never held across an upstream call.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use guru_core::types::{Conversation, Message};

use crate::context::ContextAggregator;
use crate::error::ChatError;
use crate::lifecycle::{ConversationManager, ThreadState};
use crate::orchestrator::ChatOrchestrator;

/// Point-in-time copy of a session's conversations.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub conversations: Vec<Conversation>,
    pub active_id: Option<String>,
    pub state: ThreadState,
}

pub struct ChatSession {
    manager: Arc<Mutex<ConversationManager>>,
    aggregator: Arc<ContextAggregator>,
    orchestrator: Arc<ChatOrchestrator>,
    fallback_title_words: usize,
    title_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ChatSession {
    pub fn new(
        manager: ConversationManager,
        aggregator: Arc<ContextAggregator>,
        orchestrator: Arc<ChatOrchestrator>,
        fallback_title_words: usize,
    ) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            aggregator,
            orchestrator,
            fallback_title_words,
            title_tasks: Mutex::new(Vec::new()),
        }
    }

    /// Run one turn on the active thread.
    ///
    /// Returns the message that resolved the turn (the assistant reply or an
    /// error message), or `None` if the submit was a no-op.
    pub async fn send(&self, text: &str) -> Option<Message> {
        let turn = self.manager.lock().await.submit(text)?;
        debug!(conversation = %turn.conversation_id, new_thread = turn.needs_title, "turn submitted");

        if turn.needs_title {
            self.spawn_title(turn.conversation_id.clone(), turn.message.clone())
                .await;
        }

        let context = self.aggregator.aggregate(&turn.message).await;
        let outcome = self
            .orchestrator
            .respond(&turn.message, &turn.history, Some(&context))
            .await;

        self.manager
            .lock()
            .await
            .resolve(&turn.conversation_id, outcome)
    }

    /// Wait for every title refinement started so far.
    pub async fn wait_for_titles(&self) {
        let tasks: Vec<JoinHandle<()>> = self.title_tasks.lock().await.drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }

    pub async fn start_new(&self) {
        self.manager.lock().await.start_new();
    }

    pub async fn select(&self, id: &str) -> Result<(), ChatError> {
        self.manager.lock().await.select(id)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ChatError> {
        self.manager.lock().await.delete(id)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let manager = self.manager.lock().await;
        SessionSnapshot {
            conversations: manager.conversations().to_vec(),
            active_id: manager.active_id().map(str::to_string),
            state: manager.state(),
        }
    }

    async fn spawn_title(&self, conversation_id: String, first_message: String) {
        let manager = Arc::clone(&self.manager);
        let orchestrator = Arc::clone(&self.orchestrator);
        let words = self.fallback_title_words;

        let task = tokio::spawn(async move {
            let title = orchestrator.generate_title(&first_message, words).await;
            info!(conversation = %conversation_id, title = %title, "conversation titled");
            manager.lock().await.apply_title(&conversation_id, &title);
        });

        let mut tasks = self.title_tasks.lock().await;
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use guru_core::config::{ConversationConfig, GuruConfig};
    use guru_core::types::{KnowledgeCategory, KnowledgeSnippet, Role};
    use guru_storage::{ConversationStore, Database, KnowledgeRepository, SqliteConversationStore};

    use crate::gateway::ModelGateway;
    use crate::types::{GenerationParams, Prompt};

    /// Answers title requests with a fixed title and everything else with
    /// `reply`, recording every chat prompt.
    struct ScriptedGateway {
        reply: Result<String, String>,
        title: Result<String, String>,
        chat_calls: AtomicUsize,
        chat_prompts: StdMutex<Vec<Prompt>>,
    }

    impl ScriptedGateway {
        fn new(reply: Result<&str, &str>, title: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                title: title.map(str::to_string).map_err(str::to_string),
                chat_calls: AtomicUsize::new(0),
                chat_prompts: StdMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn generate(
            &self,
            prompt: &Prompt,
            _params: &GenerationParams,
        ) -> Result<String, ChatError> {
            if prompt.segments[0].starts_with("Generate a short") {
                return self.title.clone().map_err(ChatError::Upstream);
            }
            self.chat_calls.fetch_add(1, Ordering::SeqCst);
            self.chat_prompts.lock().unwrap().push(prompt.clone());
            self.reply.clone().map_err(ChatError::Upstream)
        }
    }

    fn session_with(
        gateway: Arc<ScriptedGateway>,
        db: Arc<Database>,
    ) -> (ChatSession, Arc<SqliteConversationStore>) {
        let store = Arc::new(SqliteConversationStore::new(Arc::clone(&db)));
        let manager =
            ConversationManager::load(store.clone(), "founder@example.com", ConversationConfig::default());
        let knowledge = Arc::new(KnowledgeRepository::new(db));
        let aggregator = Arc::new(ContextAggregator::from_config(knowledge, &GuruConfig::default()));
        let orchestrator = Arc::new(ChatOrchestrator::new(gateway));
        (ChatSession::new(manager, aggregator, orchestrator, 8), store)
    }

    fn finance_snippet() -> KnowledgeSnippet {
        KnowledgeSnippet {
            category: KnowledgeCategory::Finance,
            content: "Seed rounds typically value traction over revenue.".to_string(),
            source: "guide".to_string(),
            timestamp: Utc::now(),
            relevance_score: Some(0.95),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_turn() {
        let db = Arc::new(Database::in_memory().unwrap());
        KnowledgeRepository::new(Arc::clone(&db))
            .insert(&finance_snippet())
            .unwrap();
        let gateway = ScriptedGateway::new(
            Ok("REASONING:\nInvestors weigh growth.\n\nRESPONSE:\nFocus on traction metrics."),
            Ok("Raising Startup Funding"),
        );
        let (session, store) = session_with(gateway.clone(), db);

        let msg = session.send("How do I raise funding?").await.unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "Focus on traction metrics.");
        assert_eq!(msg.reasoning.as_deref(), Some("Investors weigh growth."));

        let prompt = gateway.chat_prompts.lock().unwrap()[0].clone();
        assert!(prompt
            .system
            .contains("Seed rounds typically value traction over revenue."));

        session.wait_for_titles().await;
        let snap = session.snapshot().await;
        assert_eq!(snap.state, ThreadState::AwaitingInput);
        assert_eq!(snap.conversations.len(), 1);
        let conv = &snap.conversations[0];
        assert_eq!(conv.title, "Raising Startup Funding");
        assert!(!conv.has_pending());
        assert_eq!(conv.messages.len(), 2);

        let persisted = store.load("founder@example.com").unwrap();
        assert_eq!(persisted[0].id, conv.id);
        assert_eq!(persisted[0].title, "Raising Startup Funding");
    }

    #[tokio::test]
    async fn test_failed_turn_becomes_error_message_and_title_falls_back() {
        let db = Arc::new(Database::in_memory().unwrap());
        let gateway = ScriptedGateway::new(Err("quota exceeded"), Err("quota exceeded"));
        let (session, _) = session_with(gateway, db);

        let msg = session
            .send("What are the best channels for B2B customer acquisition today?")
            .await
            .unwrap();
        assert!(msg.content.starts_with("Error: upstream error: quota exceeded."));

        session.wait_for_titles().await;
        let snap = session.snapshot().await;
        assert_eq!(
            snap.conversations[0].title,
            "What are the best channels for B2B customer"
        );
        assert_eq!(snap.state, ThreadState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_follow_up_does_not_retitle() {
        let db = Arc::new(Database::in_memory().unwrap());
        let gateway = ScriptedGateway::new(Ok("RESPONSE: ok"), Ok("Pricing"));
        let (session, _) = session_with(gateway.clone(), db);

        session.send("How should I price?").await.unwrap();
        session.wait_for_titles().await;
        session.send("What about discounts?").await.unwrap();
        session.wait_for_titles().await;

        let snap = session.snapshot().await;
        assert_eq!(snap.conversations.len(), 1);
        assert_eq!(snap.conversations[0].title, "Pricing");
        assert_eq!(snap.conversations[0].messages.len(), 4);

        let second = gateway.chat_prompts.lock().unwrap()[1].clone();
        assert!(second.system.contains("User: How should I price?\nAI: ok"));
    }

    #[tokio::test]
    async fn test_blank_send_is_noop() {
        let db = Arc::new(Database::in_memory().unwrap());
        let gateway = ScriptedGateway::new(Ok("RESPONSE: ok"), Ok("t"));
        let (session, _) = session_with(gateway.clone(), db);

        assert!(session.send("  ").await.is_none());
        assert_eq!(gateway.chat_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.snapshot().await.state, ThreadState::NoConversation);
    }

    #[tokio::test]
    async fn test_session_navigation() {
        let db = Arc::new(Database::in_memory().unwrap());
        let gateway = ScriptedGateway::new(Ok("RESPONSE: ok"), Ok("t"));
        let (session, _) = session_with(gateway, db);

        session.send("first").await.unwrap();
        session.start_new().await;
        session.send("second").await.unwrap();
        session.wait_for_titles().await;

        let snap = session.snapshot().await;
        let first_id = snap.conversations[0].id.clone();
        session.select(&first_id).await.unwrap();
        assert_eq!(session.snapshot().await.active_id.as_deref(), Some(first_id.as_str()));

        session.delete(&first_id).await.unwrap();
        let snap = session.snapshot().await;
        assert_eq!(snap.conversations.len(), 1);
        assert_eq!(snap.active_id.as_deref(), Some(snap.conversations[0].id.as_str()));
        assert!(session.select("missing").await.is_err());
    }
}
