//! SQLite message store — durable per-session log.
//!
//! One `messages` table; insertion order is preserved by the autoincrement
//! rowid, which is what reads order by. Metadata is stored as JSON text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ironhive_core::error::MemoryError;
use ironhive_core::message::{Message, Role};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

use crate::store::MessageStore;

pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    /// Open (or create) the database at the given path.
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite message store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                id         TEXT NOT NULL,
                session_id TEXT NOT NULL,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                metadata   TEXT NOT NULL DEFAULT '{}',
                timestamp  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("messages table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("messages index: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, message: Message) -> Result<(), MemoryError> {
        let metadata = serde_json::to_string(&message.metadata)
            .map_err(|e| MemoryError::Storage(format!("metadata encode: {e}")))?;

        sqlx::query(
            "INSERT INTO messages (id, session_id, role, content, metadata, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&message.id)
        .bind(&message.session_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&metadata)
        .bind(message.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("insert message: {e}")))?;

        Ok(())
    }

    async fn read(&self, session_id: &str) -> Result<Vec<Message>, MemoryError> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, metadata, timestamp
             FROM messages WHERE session_id = ?1 ORDER BY iid",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("read messages: {e}")))?;

        let messages = rows
            .into_iter()
            .map(|row| {
                let role: String = row.get("role");
                let metadata: String = row.get("metadata");
                let timestamp: String = row.get("timestamp");
                Message {
                    id: row.get("id"),
                    role: Role::parse(&role),
                    content: row.get("content"),
                    session_id: row.get("session_id"),
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    metadata: serde_json::from_str(&metadata).unwrap_or_default(),
                }
            })
            .collect();

        Ok(messages)
    }

    async fn clear(&self, session_id: &str) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM messages WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("clear session: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (SqliteMessageStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.db");
        let store = SqliteMessageStore::new(path.to_str().unwrap())
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn append_and_read_preserves_order() {
        let (store, _dir) = temp_store().await;

        store.append(Message::system("s1", "be helpful")).await.unwrap();
        store.append(Message::user("s1", "first")).await.unwrap();
        store
            .append(Message::tool_result("s1", "call-1", "result"))
            .await
            .unwrap();

        let messages = store.read("s1").await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "first");
        assert_eq!(messages[2].tool_call_id(), Some("call-1"));
    }

    #[tokio::test]
    async fn metadata_survives_roundtrip() {
        let (store, _dir) = temp_store().await;

        store
            .append(Message::user("s1", "hi").with_agent_name("scout"))
            .await
            .unwrap();

        let messages = store.read("s1").await.unwrap();
        assert_eq!(messages[0].agent_name(), Some("scout"));
    }

    #[tokio::test]
    async fn clear_only_touches_one_session() {
        let (store, _dir) = temp_store().await;

        store.append(Message::user("a", "keep")).await.unwrap();
        store.append(Message::user("b", "drop")).await.unwrap();
        store.clear("b").await.unwrap();

        assert_eq!(store.read("a").await.unwrap().len(), 1);
        assert!(store.read("b").await.unwrap().is_empty());
    }
}
