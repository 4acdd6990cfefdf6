//! Append-only SQLite store for answer feedback

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{AnswerRecord, Language, Rating};

/// Sink for question/answer records
pub trait FeedbackStore: Send + Sync {
    /// Append a record, returning its row id
    fn save(&self, record: &AnswerRecord) -> Result<i64>;

    /// Number of stored records
    fn count(&self) -> Result<u64>;

    /// Most recent records, newest first
    fn recent(&self, limit: usize) -> Result<Vec<StoredFeedback>>;
}

/// A record as read back by operators
#[derive(Debug, Clone, Serialize)]
pub struct StoredFeedback {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub rating: Option<Rating>,
    pub lang: Option<Language>,
    pub created_at: Option<NaiveDateTime>,
}

/// SQLite-backed feedback store
pub struct SqliteFeedbackStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFeedbackStore {
    /// Create or open the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Feedback(format!("Failed to open database: {}", e)))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;

        tracing::info!("Feedback store ready at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Feedback(format!("Failed to open in-memory database: {}", e)))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS feedbacks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT,
                response TEXT,
                feedback TEXT,
                lang TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;
        Ok(())
    }
}

impl FeedbackStore for SqliteFeedbackStore {
    fn save(&self, record: &AnswerRecord) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO feedbacks (question, response, feedback, lang) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.question,
                record.answer,
                record.rating.map(|r| r.label()),
                record.lang.code(),
            ],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(
            "Stored feedback #{} ({})",
            id,
            record.rating.map(|r| r.label()).unwrap_or("unrated")
        );
        Ok(id)
    }

    fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM feedbacks", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn recent(&self, limit: usize) -> Result<Vec<StoredFeedback>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, question, response, feedback, lang, created_at
             FROM feedbacks ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            let rating: Option<String> = row.get(3)?;
            let lang: Option<String> = row.get(4)?;
            Ok(StoredFeedback {
                id: row.get(0)?,
                question: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                answer: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                rating: rating.as_deref().and_then(Rating::from_label),
                lang: lang.and_then(|l| l.parse().ok()),
                created_at: row.get(5).ok(),
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
