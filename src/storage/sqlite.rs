use crate::sentiment::Sentiment;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database operation failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// A stored review, deserialized from a table row by column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub text: String,
    pub sentiment: String,
    pub created_at: String,
}

/// SQLite-backed review store.
///
/// Holds one long-lived connection behind an async mutex; each operation
/// acquires the lock for its duration only. SQLite's own locking handles
/// durability under concurrent access.
pub struct ReviewStore {
    conn: Arc<Mutex<Connection>>,
}

impl ReviewStore {
    /// Open (or create) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StorageError::Open {
            path: path.display().to_string(),
            source,
        })?;

        info!("Database connection established at: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create the reviews table if it does not already exist.
    pub async fn create_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().await;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS reviews (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                text        TEXT    NOT NULL,
                sentiment   TEXT    NOT NULL,
                created_at  TEXT    NOT NULL
            );",
        )?;

        Ok(())
    }

    /// Append one review row. Returns the assigned id.
    ///
    /// AUTOINCREMENT guarantees ids are monotonically increasing and
    /// never reused, even across deletions in future schema revisions.
    pub async fn insert(
        &self,
        text: &str,
        sentiment: Sentiment,
        created_at: &str,
    ) -> Result<i64, StorageError> {
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT INTO reviews (text, sentiment, created_at) VALUES (?1, ?2, ?3)",
            (text, sentiment.as_str(), created_at),
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// All reviews whose sentiment equals `sentiment`, in insertion order.
    ///
    /// An unrecognized label is not an error; it simply matches no rows.
    pub async fn list_by_sentiment(&self, sentiment: &str) -> Result<Vec<Review>, StorageError> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(
            "SELECT id, text, sentiment, created_at FROM reviews
             WHERE sentiment = ?1 ORDER BY id",
        )?;

        let reviews = stmt
            .query_map([sentiment], row_to_review)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(reviews)
    }

    /// Total number of stored reviews.
    pub async fn count(&self) -> Result<i64, StorageError> {
        let conn = self.conn.lock().await;
        let count = conn.query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn row_to_review(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get("id")?,
        text: row.get("text")?,
        sentiment: row.get("sentiment")?,
        created_at: row.get("created_at")?,
    })
}
