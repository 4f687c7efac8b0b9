//! Per-user conversation persistence.
//!
//! The whole retained conversation set is stored as one JSON blob under
//! `conversations_<userId>`. Writes are last-write-wins.
//!
//! Entries that no longer decode are skipped on load, and the blob they came
//! from is copied to `conversations_<userId>.unreadable` first so the next
//! save cannot erase them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::OptionalExtension;
use tracing::warn;

use guru_core::error::GuruError;
use guru_core::types::Conversation;

use crate::db::Database;

/// Storage key for a user's conversation set.
pub fn storage_key(user_id: &str) -> String {
    format!("conversations_{}", user_id)
}

/// Key holding the last blob that contained undecodable entries.
pub fn unreadable_key(user_id: &str) -> String {
    format!("{}.unreadable", storage_key(user_id))
}

/// Decode a stored set entry by entry. Returns the readable conversations and
/// the number of entries skipped.
fn decode_entries(user_id: &str, json: &str) -> Result<(Vec<Conversation>, usize), GuruError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut skipped = 0;
    let conversations = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<Conversation>(entry) {
            Ok(conv) => Some(conv),
            Err(e) => {
                warn!(user = %user_id, index, error = %e, "skipping unreadable conversation");
                skipped += 1;
                None
            }
        })
        .collect();
    Ok((conversations, skipped))
}

/// Session-scoped store for a user's conversations.
pub trait ConversationStore: Send + Sync {
    /// Read the persisted set. A user with nothing stored gets an empty list.
    fn load(&self, user_id: &str) -> Result<Vec<Conversation>, GuruError>;

    /// Replace the persisted set.
    fn save(&self, user_id: &str, conversations: &[Conversation]) -> Result<(), GuruError>;
}

/// SQLite-backed store using the `user_state` table.
pub struct SqliteConversationStore {
    db: Arc<Database>,
}

impl SqliteConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn put(&self, key: &str, json: &str) -> Result<(), GuruError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_state (key, value, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                rusqlite::params![key, json],
            )
            .map_err(|e| GuruError::Storage(format!("Failed to save conversations: {}", e)))?;
            Ok(())
        })
    }
}

impl ConversationStore for SqliteConversationStore {
    fn load(&self, user_id: &str) -> Result<Vec<Conversation>, GuruError> {
        let key = storage_key(user_id);
        let blob: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM user_state WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| GuruError::Storage(e.to_string()))
        })?;

        let Some(json) = blob else {
            return Ok(Vec::new());
        };
        let (conversations, skipped) = decode_entries(user_id, &json)?;
        if skipped > 0 {
            self.put(&unreadable_key(user_id), &json)?;
            warn!(user = %user_id, skipped, "unreadable set copied to {}", unreadable_key(user_id));
        }
        Ok(conversations)
    }

    fn save(&self, user_id: &str, conversations: &[Conversation]) -> Result<(), GuruError> {
        let json = serde_json::to_string(conversations)?;
        self.put(&storage_key(user_id), &json)
    }
}

/// In-process store, keyed the same way as the SQLite store.
#[derive(Default)]
pub struct MemoryConversationStore {
    blobs: Mutex<HashMap<String, Vec<Conversation>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for MemoryConversationStore {
    fn load(&self, user_id: &str) -> Result<Vec<Conversation>, GuruError> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|e| GuruError::Storage(format!("store lock poisoned: {}", e)))?;
        Ok(blobs.get(&storage_key(user_id)).cloned().unwrap_or_default())
    }

    fn save(&self, user_id: &str, conversations: &[Conversation]) -> Result<(), GuruError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|e| GuruError::Storage(format!("store lock poisoned: {}", e)))?;
        blobs.insert(storage_key(user_id), conversations.to_vec());
        Ok(())
    }
}
