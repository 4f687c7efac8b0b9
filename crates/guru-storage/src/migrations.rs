//! Database schema migrations.
//!
//! Applies the initial schema: the business_knowledge table read by the
//! chat pipeline and the user_state table holding per-user blobs.

use rusqlite::Connection;
use tracing::info;

use guru_core::error::GuruError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), GuruError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| GuruError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| GuruError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), GuruError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS business_knowledge (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            category        TEXT NOT NULL
                            CHECK (category IN ('startup', 'market', 'finance', 'strategy',
                                                'legal', 'technology', 'innovation')),
            content         TEXT NOT NULL,
            source          TEXT NOT NULL DEFAULT '',
            timestamp       TEXT NOT NULL,
            relevance_score REAL
        );

        CREATE INDEX IF NOT EXISTS idx_business_knowledge_relevance
            ON business_knowledge (relevance_score DESC);

        -- Opaque per-user blobs, e.g. conversations_<userId>.
        CREATE TABLE IF NOT EXISTS user_state (
            key             TEXT PRIMARY KEY NOT NULL,
            value           TEXT NOT NULL,
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| GuruError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_knowledge_category_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO business_knowledge (category, content, timestamp)
             VALUES ('astrology', 'x', '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_user_state_key_is_unique() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO user_state (key, value) VALUES ('k', '[]')",
            [],
        )
        .unwrap();
        let result = conn.execute("INSERT INTO user_state (key, value) VALUES ('k', '[]')", []);
        assert!(result.is_err());
    }
}
