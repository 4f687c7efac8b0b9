//! Business knowledge store.
//!
//! Read-only from the chat pipeline's perspective: snippets are produced by
//! an external seeding tool and ranked here by relevance score.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use guru_core::error::GuruError;
use guru_core::types::{KnowledgeCategory, KnowledgeSnippet};

use crate::db::Database;

/// Repository over the `business_knowledge` table.
pub struct KnowledgeRepository {
    db: Arc<Database>,
}

impl KnowledgeRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Highest-ranked snippets, relevance descending. Unscored snippets rank last.
    pub fn top_by_relevance(&self, limit: usize) -> Result<Vec<KnowledgeSnippet>, GuruError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT category, content, source, timestamp, relevance_score
                     FROM business_knowledge
                     ORDER BY relevance_score DESC NULLS LAST, id ASC
                     LIMIT ?1",
                )
                .map_err(|e| GuruError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![limit as i64], |row| {
                    Ok(row_to_snippet(row))
                })
                .map_err(|e| GuruError::Storage(e.to_string()))?;

            let mut snippets = Vec::new();
            for row in rows {
                let snippet = row.map_err(|e| GuruError::Storage(e.to_string()))??;
                snippets.push(snippet);
            }
            Ok(snippets)
        })
    }

    /// Store a snippet. Used by seeding tools and tests.
    pub fn insert(&self, snippet: &KnowledgeSnippet) -> Result<(), GuruError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO business_knowledge (category, content, source, timestamp, relevance_score)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    snippet.category.as_str(),
                    snippet.content,
                    snippet.source,
                    snippet.timestamp.to_rfc3339(),
                    snippet.relevance_score,
                ],
            )
            .map_err(|e| GuruError::Storage(format!("Failed to save snippet: {}", e)))?;
            Ok(())
        })
    }

    pub fn count(&self) -> Result<u64, GuruError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM business_knowledge", [], |row| {
                    row.get(0)
                })
                .map_err(|e| GuruError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

fn row_to_snippet(row: &rusqlite::Row<'_>) -> Result<KnowledgeSnippet, GuruError> {
    let get_err = |e: rusqlite::Error| GuruError::Storage(e.to_string());

    let category: String = row.get(0).map_err(get_err)?;
    let timestamp: String = row.get(3).map_err(get_err)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| GuruError::Storage(format!("Invalid snippet timestamp: {}", e)))?
        .with_timezone(&Utc);

    Ok(KnowledgeSnippet {
        category: category.parse::<KnowledgeCategory>()?,
        content: row.get(1).map_err(get_err)?,
        source: row.get(2).map_err(get_err)?,
        timestamp,
        relevance_score: row.get(4).map_err(get_err)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_repo() -> KnowledgeRepository {
        KnowledgeRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn snippet(category: KnowledgeCategory, content: &str, score: Option<f64>) -> KnowledgeSnippet {
        KnowledgeSnippet {
            category,
            content: content.to_string(),
            source: "Startup Playbook".to_string(),
            timestamp: Utc::now(),
            relevance_score: score,
        }
    }

    #[test]
    fn test_empty_store_returns_nothing() {
        let repo = make_repo();
        assert!(repo.top_by_relevance(5).unwrap().is_empty());
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_top_by_relevance_orders_and_limits() {
        let repo = make_repo();
        for (i, score) in [0.2, 0.9, 0.5, 0.7, 0.1, 0.8, 0.3].iter().enumerate() {
            repo.insert(&snippet(
                KnowledgeCategory::Strategy,
                &format!("fact {}", i),
                Some(*score),
            ))
            .unwrap();
        }

        let top = repo.top_by_relevance(5).unwrap();
        let scores: Vec<f64> = top.iter().map(|s| s.relevance_score.unwrap()).collect();
        assert_eq!(scores, vec![0.9, 0.8, 0.7, 0.5, 0.3]);
        assert_eq!(repo.count().unwrap(), 7);
    }

    #[test]
    fn test_unscored_snippets_rank_last() {
        let repo = make_repo();
        repo.insert(&snippet(KnowledgeCategory::Legal, "unscored", None))
            .unwrap();
        repo.insert(&snippet(KnowledgeCategory::Finance, "scored", Some(0.1)))
            .unwrap();

        let top = repo.top_by_relevance(5).unwrap();
        assert_eq!(top[0].content, "scored");
        assert_eq!(top[1].content, "unscored");
        assert!(top[1].relevance_score.is_none());
    }

    #[test]
    fn test_snippet_fields_survive_storage() {
        let repo = make_repo();
        let original = snippet(
            KnowledgeCategory::Finance,
            "Key metrics include CAC, LTV, burn rate, and runway.",
            Some(0.95),
        );
        repo.insert(&original).unwrap();

        let loaded = repo.top_by_relevance(1).unwrap().remove(0);
        assert_eq!(loaded.category, KnowledgeCategory::Finance);
        assert_eq!(loaded.content, original.content);
        assert_eq!(loaded.source, original.source);
        assert_eq!(loaded.timestamp.timestamp(), original.timestamp.timestamp());
    }
}
