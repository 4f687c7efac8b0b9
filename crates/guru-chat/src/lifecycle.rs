//! Conversation lifecycle for one user session.
//!
//! [`ConversationManager`] is the single owner and the only writer of the
//! user's conversation set. Every mutation persists the full bounded set
//! through the injected [`ConversationStore`]; persistence failures are
//! logged and never abort the session.
//!
//! If the stored set could not be read at load time, nothing is written
//! until a later read succeeds and the stored conversations are merged back
//! in. A save never replaces a set this session has not seen.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use guru_core::config::ConversationConfig;
use guru_core::types::{Conversation, Message};
use guru_storage::ConversationStore;

use crate::error::ChatError;
use crate::types::ChatReply;

/// Where the active thread stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Nothing selected; the next submit opens a new thread.
    NoConversation,
    AwaitingInput,
    /// A placeholder is in the thread and the reply has not resolved yet.
    AwaitingResponse,
}

/// A submitted turn waiting for its reply.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub conversation_id: String,
    pub message: String,
    /// Messages that preceded this turn.
    pub history: Vec<Message>,
    /// The turn opened a new thread whose provisional title should be refined.
    pub needs_title: bool,
}

pub struct ConversationManager {
    user_id: String,
    store: Arc<dyn ConversationStore>,
    limits: ConversationConfig,
    /// Insertion order; index 0 is the oldest.
    conversations: Vec<Conversation>,
    active: Option<String>,
    awaiting: HashSet<String>,
    /// The stored set is unknown; saving now would overwrite it.
    load_failed: bool,
}

impl ConversationManager {
    /// Restore `user_id`'s conversations. A failed read starts empty and
    /// holds back saves until the stored set can be read.
    ///
    /// Placeholders left behind by an earlier session are dropped, since no
    /// reply will ever resolve them.
    pub fn load(
        store: Arc<dyn ConversationStore>,
        user_id: impl Into<String>,
        limits: ConversationConfig,
    ) -> Self {
        let user_id = user_id.into();
        let (conversations, load_failed) = match store.load(&user_id) {
            Ok(conversations) => (conversations, false),
            Err(e) => {
                warn!(user = %user_id, error = %e, "failed to load conversations, starting empty");
                (Vec::new(), true)
            }
        };

        let mut mgr = Self {
            user_id,
            store,
            limits,
            conversations: restorable(conversations),
            active: None,
            awaiting: HashSet::new(),
            load_failed,
        };
        mgr.enforce_bound();

        info!(user = %mgr.user_id, count = mgr.conversations.len(), "conversations loaded");
        mgr
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// All retained conversations, oldest inserted first.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn state(&self) -> ThreadState {
        match self.active.as_deref() {
            Some(id) => self.state_of(id),
            None => ThreadState::NoConversation,
        }
    }

    /// State of a specific thread; unknown ids report `NoConversation`.
    pub fn state_of(&self, id: &str) -> ThreadState {
        if self.get(id).is_none() {
            ThreadState::NoConversation
        } else if self.awaiting.contains(id) {
            ThreadState::AwaitingResponse
        } else {
            ThreadState::AwaitingInput
        }
    }

    /// Deselect so the next submit opens a new thread.
    pub fn start_new(&mut self) {
        self.active = None;
    }

    pub fn select(&mut self, id: &str) -> Result<(), ChatError> {
        if self.get(id).is_none() {
            return Err(ChatError::ConversationNotFound(id.to_string()));
        }
        self.active = Some(id.to_string());
        Ok(())
    }

    /// Record a user message on the active thread, opening one if needed.
    ///
    /// Returns `None` (and changes nothing) for blank text or while the
    /// active thread is still awaiting a response.
    pub fn submit(&mut self, text: &str) -> Option<PendingTurn> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.state() == ThreadState::AwaitingResponse {
            debug!("submit ignored, response still in flight");
            return None;
        }

        let (id, history, needs_title) = match self.active.clone() {
            Some(id) => {
                let conv = self.get_mut(&id)?;
                let history = conv.messages.clone();
                conv.messages.push(Message::user(text));
                conv.messages.push(Message::pending());
                (id, history, false)
            }
            None => {
                let title: String = text
                    .chars()
                    .take(self.limits.provisional_title_chars)
                    .collect();
                let conv = Conversation::new(title, vec![Message::user(text), Message::pending()]);
                let id = conv.id.clone();
                self.insert(conv);
                self.active = Some(id.clone());
                (id, Vec::new(), true)
            }
        };

        self.awaiting.insert(id.clone());
        self.persist();

        Some(PendingTurn {
            conversation_id: id,
            message: text.to_string(),
            history,
            needs_title,
        })
    }

    /// Replace the turn's placeholder with its outcome.
    ///
    /// A resolution for a conversation that no longer exists is dropped.
    pub fn resolve(
        &mut self,
        conversation_id: &str,
        outcome: Result<ChatReply, ChatError>,
    ) -> Option<Message> {
        self.awaiting.remove(conversation_id);

        let message = match outcome {
            Ok(reply) => {
                let reasoning = Some(reply.reasoning).filter(|r| !r.is_empty());
                Message::assistant(reply.message, reasoning)
            }
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "chat turn failed");
                Message::error(&e.to_string())
            }
        };

        let Some(conv) = self.get_mut(conversation_id) else {
            debug!(conversation = %conversation_id, "resolution for deleted conversation dropped");
            return None;
        };
        conv.messages.retain(|m| !m.is_pending);
        conv.messages.push(message.clone());

        self.persist();
        Some(message)
    }

    /// Set a thread's title. The id never changes.
    pub fn apply_title(&mut self, conversation_id: &str, title: &str) {
        let Some(conv) = self.get_mut(conversation_id) else {
            return;
        };
        conv.title = title.to_string();
        self.persist();
    }

    /// Remove a thread. If it was active, the most recently created remaining
    /// thread becomes active.
    pub fn delete(&mut self, id: &str) -> Result<(), ChatError> {
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))?;
        self.conversations.remove(index);
        self.awaiting.remove(id);

        if self.active.as_deref() == Some(id) {
            self.active = self
                .conversations
                .iter()
                .max_by_key(|c| c.created_at)
                .map(|c| c.id.clone());
        }

        info!(conversation = %id, "conversation deleted");
        self.persist();
        Ok(())
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    fn insert(&mut self, conv: Conversation) {
        self.conversations.push(conv);
        self.enforce_bound();
    }

    fn enforce_bound(&mut self) {
        let max = self.limits.max_retained.max(1);
        while self.conversations.len() > max {
            let evicted = self.conversations.remove(0);
            self.awaiting.remove(&evicted.id);
            if self.active.as_deref() == Some(evicted.id.as_str()) {
                self.active = None;
            }
            debug!(conversation = %evicted.id, "evicted oldest conversation");
        }
    }

    /// Retry the read that failed at load time, placing the stored
    /// conversations ahead of the ones created since.
    fn recover_stored(&mut self) -> bool {
        match self.store.load(&self.user_id) {
            Ok(stored) => {
                let mut merged: Vec<Conversation> = restorable(stored)
                    .into_iter()
                    .filter(|c| self.get(&c.id).is_none())
                    .collect();
                info!(user = %self.user_id, count = merged.len(), "stored conversations recovered");
                merged.append(&mut self.conversations);
                self.conversations = merged;
                self.load_failed = false;
                self.enforce_bound();
                true
            }
            Err(e) => {
                warn!(user = %self.user_id, error = %e, "stored set still unreadable, not saving");
                false
            }
        }
    }

    fn persist(&mut self) {
        if self.load_failed && !self.recover_stored() {
            return;
        }
        if let Err(e) = self.store.save(&self.user_id, &self.conversations) {
            warn!(user = %self.user_id, error = %e, "failed to persist conversations");
        }
    }
}

/// Drop placeholders no reply will resolve, and threads left empty by that.
fn restorable(mut conversations: Vec<Conversation>) -> Vec<Conversation> {
    for conv in &mut conversations {
        conv.messages.retain(|m| !m.is_pending);
    }
    conversations.retain(|c| !c.messages.is_empty());
    conversations
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use chrono::{Duration, Utc};
    use guru_core::error::GuruError;
    use guru_core::types::Role;
    use guru_storage::MemoryConversationStore;

    struct FailingStore {
        saves: AtomicUsize,
    }

    impl ConversationStore for FailingStore {
        fn load(&self, _user_id: &str) -> Result<Vec<Conversation>, GuruError> {
            Ok(Vec::new())
        }

        fn save(&self, _user_id: &str, _conversations: &[Conversation]) -> Result<(), GuruError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Err(GuruError::Storage("offline".to_string()))
        }
    }

    /// Reads fail while `readable` is false; writes go to the inner store.
    struct FlakyStore {
        inner: MemoryConversationStore,
        readable: AtomicBool,
        saves: AtomicUsize,
    }

    impl FlakyStore {
        fn seeded(user_id: &str, conversations: &[Conversation]) -> Self {
            let inner = MemoryConversationStore::new();
            inner.save(user_id, conversations).unwrap();
            Self {
                inner,
                readable: AtomicBool::new(false),
                saves: AtomicUsize::new(0),
            }
        }
    }

    impl ConversationStore for FlakyStore {
        fn load(&self, user_id: &str) -> Result<Vec<Conversation>, GuruError> {
            if self.readable.load(Ordering::SeqCst) {
                self.inner.load(user_id)
            } else {
                Err(GuruError::Storage("database is locked".to_string()))
            }
        }

        fn save(&self, user_id: &str, conversations: &[Conversation]) -> Result<(), GuruError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(user_id, conversations)
        }
    }

    fn manager() -> (ConversationManager, Arc<MemoryConversationStore>) {
        let store = Arc::new(MemoryConversationStore::new());
        let mgr = ConversationManager::load(
            store.clone(),
            "founder@example.com",
            ConversationConfig::default(),
        );
        (mgr, store)
    }

    fn reply(text: &str) -> Result<ChatReply, ChatError> {
        Ok(ChatReply {
            message: text.to_string(),
            reasoning: "because".to_string(),
        })
    }

    #[test]
    fn test_fresh_session_has_no_conversation() {
        let (mgr, _) = manager();
        assert_eq!(mgr.state(), ThreadState::NoConversation);
        assert!(mgr.conversations().is_empty());
    }

    #[test]
    fn test_first_submit_opens_thread_with_provisional_title() {
        let (mut mgr, store) = manager();
        let text = "How should I price an enterprise SaaS product for mid-market buyers?";
        let turn = mgr.submit(text).unwrap();

        assert!(turn.needs_title);
        assert!(turn.history.is_empty());
        assert_eq!(turn.message, text);
        assert_eq!(mgr.state(), ThreadState::AwaitingResponse);

        let conv = mgr.active().unwrap();
        assert_eq!(conv.title, text.chars().take(32).collect::<String>());
        assert_eq!(conv.messages.len(), 2);
        assert!(conv.messages[1].is_pending);

        let persisted = store.load("founder@example.com").unwrap();
        assert_eq!(persisted.len(), 1);
        assert!(persisted[0].has_pending());
    }

    #[test]
    fn test_blank_submit_is_noop() {
        let (mut mgr, store) = manager();
        assert!(mgr.submit("   ").is_none());
        assert!(mgr.conversations().is_empty());
        assert!(store.load("founder@example.com").unwrap().is_empty());
    }

    #[test]
    fn test_second_submit_while_awaiting_is_noop() {
        let (mut mgr, _) = manager();
        mgr.submit("first").unwrap();
        assert!(mgr.submit("second").is_none());
        assert_eq!(mgr.active().unwrap().messages.len(), 2);
    }

    #[test]
    fn test_resolve_replaces_placeholder() {
        let (mut mgr, store) = manager();
        let turn = mgr.submit("How do I raise funding?").unwrap();
        let msg = mgr
            .resolve(&turn.conversation_id, reply("Focus on traction metrics."))
            .unwrap();

        assert_eq!(msg.content, "Focus on traction metrics.");
        assert_eq!(msg.reasoning.as_deref(), Some("because"));
        assert_eq!(mgr.state(), ThreadState::AwaitingInput);

        let conv = mgr.active().unwrap();
        assert!(!conv.has_pending());
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[1].role, Role::Assistant);
        assert!(!store.load("founder@example.com").unwrap()[0].has_pending());
    }

    #[test]
    fn test_resolve_error_appends_error_message() {
        let (mut mgr, _) = manager();
        let turn = mgr.submit("hi").unwrap();
        let msg = mgr
            .resolve(&turn.conversation_id, Err(ChatError::Upstream("503".to_string())))
            .unwrap();
        assert_eq!(
            msg.content,
            "Error: upstream error: 503. Please try again or contact support if the issue persists."
        );
        assert_eq!(mgr.state(), ThreadState::AwaitingInput);
    }

    #[test]
    fn test_follow_up_carries_history() {
        let (mut mgr, _) = manager();
        let turn = mgr.submit("What is CAC?").unwrap();
        mgr.resolve(&turn.conversation_id, reply("Acquisition cost.")).unwrap();

        let next = mgr.submit("And LTV?").unwrap();
        assert!(!next.needs_title);
        assert_eq!(next.conversation_id, turn.conversation_id);
        assert_eq!(next.history.len(), 2);
        assert_eq!(next.history[0].content, "What is CAC?");
        assert_eq!(mgr.conversations().len(), 1);
    }

    #[test]
    fn test_start_new_then_submit_opens_second_thread() {
        let (mut mgr, _) = manager();
        let first = mgr.submit("one").unwrap();
        mgr.resolve(&first.conversation_id, reply("ok")).unwrap();

        mgr.start_new();
        assert_eq!(mgr.state(), ThreadState::NoConversation);
        let second = mgr.submit("two").unwrap();
        assert!(second.needs_title);
        assert_ne!(first.conversation_id, second.conversation_id);
        assert_eq!(mgr.conversations().len(), 2);
    }

    #[test]
    fn test_other_thread_can_submit_while_one_awaits() {
        let (mut mgr, _) = manager();
        let first = mgr.submit("one").unwrap();
        mgr.start_new();
        let second = mgr.submit("two").unwrap();

        assert_eq!(mgr.state_of(&first.conversation_id), ThreadState::AwaitingResponse);
        assert_eq!(mgr.state_of(&second.conversation_id), ThreadState::AwaitingResponse);
        assert_eq!(mgr.state_of("missing"), ThreadState::NoConversation);
    }

    #[test]
    fn test_select_unknown_is_error() {
        let (mut mgr, _) = manager();
        assert!(matches!(
            mgr.select("nope"),
            Err(ChatError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn test_apply_title_keeps_id() {
        let (mut mgr, store) = manager();
        let turn = mgr.submit("How do I raise funding?").unwrap();
        mgr.apply_title(&turn.conversation_id, "Startup Funding");

        let conv = mgr.get(&turn.conversation_id).unwrap();
        assert_eq!(conv.title, "Startup Funding");
        assert_eq!(store.load("founder@example.com").unwrap()[0].title, "Startup Funding");
    }

    #[test]
    fn test_delete_active_selects_most_recent() {
        let (mut mgr, _) = manager();
        let a = mgr.submit("a").unwrap().conversation_id;
        mgr.resolve(&a, reply("ok"));
        mgr.start_new();
        let b = mgr.submit("b").unwrap().conversation_id;
        mgr.resolve(&b, reply("ok"));
        mgr.start_new();
        let c = mgr.submit("c").unwrap().conversation_id;

        mgr.delete(&c).unwrap();
        assert_eq!(mgr.active_id(), Some(b.as_str()));
        mgr.delete(&b).unwrap();
        assert_eq!(mgr.active_id(), Some(a.as_str()));
        mgr.delete(&a).unwrap();
        assert_eq!(mgr.state(), ThreadState::NoConversation);
        assert!(matches!(mgr.delete(&a), Err(ChatError::ConversationNotFound(_))));
    }

    #[test]
    fn test_delete_inactive_keeps_selection() {
        let (mut mgr, _) = manager();
        let a = mgr.submit("a").unwrap().conversation_id;
        mgr.resolve(&a, reply("ok"));
        mgr.start_new();
        let b = mgr.submit("b").unwrap().conversation_id;

        mgr.delete(&a).unwrap();
        assert_eq!(mgr.active_id(), Some(b.as_str()));
    }

    #[test]
    fn test_resolution_after_delete_is_dropped() {
        let (mut mgr, store) = manager();
        let turn = mgr.submit("doomed").unwrap();
        mgr.delete(&turn.conversation_id).unwrap();

        assert!(mgr.resolve(&turn.conversation_id, reply("late")).is_none());
        assert!(mgr.conversations().is_empty());
        assert!(store.load("founder@example.com").unwrap().is_empty());
    }

    #[test]
    fn test_set_is_bounded_fifo_by_insertion() {
        let store = Arc::new(MemoryConversationStore::new());
        let limits = ConversationConfig {
            max_retained: 3,
            ..ConversationConfig::default()
        };
        let mut mgr = ConversationManager::load(store.clone(), "u", limits);

        let mut ids = Vec::new();
        for i in 0..5 {
            mgr.start_new();
            let turn = mgr.submit(&format!("question {}", i)).unwrap();
            mgr.resolve(&turn.conversation_id, reply("ok"));
            ids.push(turn.conversation_id);
            // Touching the oldest must not protect it from eviction.
            let oldest = mgr.conversations()[0].id.clone();
            mgr.select(&oldest).unwrap();
        }

        let kept: Vec<&str> = mgr.conversations().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(kept, vec![ids[2].as_str(), ids[3].as_str(), ids[4].as_str()]);
        assert_eq!(store.load("u").unwrap().len(), 3);
    }

    #[test]
    fn test_default_bound_is_fifty() {
        let (mut mgr, _) = manager();
        for i in 0..55 {
            mgr.start_new();
            let turn = mgr.submit(&format!("q{}", i)).unwrap();
            mgr.resolve(&turn.conversation_id, reply("ok"));
        }
        assert_eq!(mgr.conversations().len(), 50);
        assert_eq!(mgr.conversations()[0].messages[0].content, "q5");
    }

    #[test]
    fn test_load_restores_and_drops_stale_placeholders() {
        let store = Arc::new(MemoryConversationStore::new());
        let mut stale = Conversation::new("old", vec![Message::user("hi"), Message::pending()]);
        stale.created_at = Utc::now() - Duration::days(1);
        store.save("u", &[stale.clone()]).unwrap();

        let mgr = ConversationManager::load(store, "u", ConversationConfig::default());
        assert_eq!(mgr.conversations().len(), 1);
        assert!(!mgr.conversations()[0].has_pending());
        assert_eq!(mgr.state(), ThreadState::NoConversation);
        assert_eq!(mgr.state_of(&stale.id), ThreadState::AwaitingInput);
    }

    #[test]
    fn test_persistence_failures_are_non_fatal() {
        let store = Arc::new(FailingStore {
            saves: AtomicUsize::new(0),
        });
        let mut mgr = ConversationManager::load(store.clone(), "u", ConversationConfig::default());
        assert!(mgr.conversations().is_empty());

        let turn = mgr.submit("still works").unwrap();
        mgr.resolve(&turn.conversation_id, reply("yes")).unwrap();
        assert_eq!(mgr.active().unwrap().messages.len(), 2);
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unreadable_store_is_never_overwritten() {
        let keep = Conversation::new("keep", vec![Message::user("earlier question")]);
        let store = Arc::new(FlakyStore::seeded("u", &[keep.clone()]));
        let mut mgr = ConversationManager::load(store.clone(), "u", ConversationConfig::default());
        assert!(mgr.conversations().is_empty());

        let turn = mgr.submit("new question").unwrap();
        mgr.resolve(&turn.conversation_id, reply("answer")).unwrap();
        mgr.apply_title(&turn.conversation_id, "New Question");

        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        let stored = store.inner.load("u").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, keep.id);
        assert_eq!(mgr.active().unwrap().messages.len(), 2);
    }

    #[test]
    fn test_stored_set_is_merged_once_readable_again() {
        let keep = Conversation::new("keep", vec![Message::user("earlier question")]);
        let store = Arc::new(FlakyStore::seeded("u", &[keep.clone()]));
        let mut mgr = ConversationManager::load(store.clone(), "u", ConversationConfig::default());

        let first = mgr.submit("while locked").unwrap();
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);

        store.readable.store(true, Ordering::SeqCst);
        mgr.resolve(&first.conversation_id, reply("answer")).unwrap();

        let ids: Vec<&str> = mgr.conversations().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![keep.id.as_str(), first.conversation_id.as_str()]);
        assert_eq!(mgr.active_id(), Some(first.conversation_id.as_str()));

        let stored = store.inner.load("u").unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].id, keep.id);
        assert!(!stored[1].has_pending());
    }
}
