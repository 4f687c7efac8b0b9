//! Guru Storage crate - SQLite persistence for knowledge and conversations.
//!
//! Provides a WAL-mode SQLite database with migrations, the read side of the
//! business knowledge store, and the per-user conversation blob store.

pub mod conversations;
pub mod db;
pub mod knowledge;
pub mod migrations;

pub use conversations::{
    storage_key, unreadable_key, ConversationStore, MemoryConversationStore,
    SqliteConversationStore,
};
pub use db::Database;
pub use knowledge::KnowledgeRepository;
