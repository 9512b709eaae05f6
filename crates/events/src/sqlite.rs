//! SQLite event store — durable append-only log.
//!
//! Events are serialized as JSON rows ordered by autoincrement rowid.
//! A stream replays all committed rows for the session, then polls for new
//! ones, so consumers can reconnect and resume from the start at any time.

use async_trait::async_trait;
use ironhive_core::error::EventError;
use ironhive_core::event::AgentEvent;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::store::EventStore;

/// How often a live stream checks for newly committed rows.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Depth of the per-subscriber delivery channel.
const SUBSCRIBER_CAPACITY: usize = 64;

pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Open (or create) the database at the given path.
    pub async fn new(path: &str) -> Result<Self, EventError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| EventError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| EventError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite event store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), EventError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                payload    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EventError::Storage(format!("events table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| EventError::Storage(format!("events index: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, event: AgentEvent) -> Result<(), EventError> {
        let payload = serde_json::to_string(&event)
            .map_err(|e| EventError::Storage(format!("event encode: {e}")))?;

        sqlx::query("INSERT INTO events (session_id, payload) VALUES (?1, ?2)")
            .bind(&event.session_id)
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(|e| EventError::Storage(format!("insert event: {e}")))?;

        Ok(())
    }

    async fn stream(&self, session_id: &str) -> Result<mpsc::Receiver<AgentEvent>, EventError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let pool = self.pool.clone();
        let session = session_id.to_string();

        tokio::spawn(async move {
            let mut last_iid: i64 = 0;
            loop {
                if tx.is_closed() {
                    return;
                }

                let rows = sqlx::query(
                    "SELECT iid, payload FROM events
                     WHERE session_id = ?1 AND iid > ?2 ORDER BY iid",
                )
                .bind(&session)
                .bind(last_iid)
                .fetch_all(&pool)
                .await;

                match rows {
                    Ok(rows) => {
                        for row in rows {
                            let iid: i64 = row.get("iid");
                            let payload: String = row.get("payload");
                            last_iid = iid;
                            match serde_json::from_str::<AgentEvent>(&payload) {
                                Ok(event) => {
                                    if tx.send(event).await.is_err() {
                                        return;
                                    }
                                }
                                Err(e) => {
                                    warn!(iid, error = %e, "Skipping undecodable event row");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Event stream poll failed");
                    }
                }

                tokio::time::sleep(POLL_INTERVAL).await;
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironhive_core::event::EventKind;

    fn event(session: &str, content: &str) -> AgentEvent {
        AgentEvent::new(
            EventKind::Observation {
                content: content.into(),
            },
            "tester",
            session,
        )
    }

    async fn temp_store() -> (SqliteEventStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        let store = SqliteEventStore::new(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn stream_replays_committed_events_in_order() {
        let (store, _dir) = temp_store().await;
        store.append(event("s1", "one")).await.unwrap();
        store.append(event("s1", "two")).await.unwrap();

        let mut rx = store.stream("s1").await.unwrap();
        let mut contents = Vec::new();
        for _ in 0..2 {
            if let EventKind::Observation { content } = rx.recv().await.unwrap().kind {
                contents.push(content);
            }
        }
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn stream_picks_up_events_appended_later() {
        let (store, _dir) = temp_store().await;
        let mut rx = store.stream("s1").await.unwrap();

        store.append(event("s1", "late")).await.unwrap();

        let ev = rx.recv().await.unwrap();
        match ev.kind {
            EventKind::Observation { content } => assert_eq!(content, "late"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn restarted_stream_replays_from_the_beginning() {
        let (store, _dir) = temp_store().await;
        store.append(event("s1", "persisted")).await.unwrap();

        // First consumer reads and disconnects.
        let mut rx = store.stream("s1").await.unwrap();
        rx.recv().await.unwrap();
        drop(rx);

        // A fresh consumer still sees the full history.
        let mut rx = store.stream("s1").await.unwrap();
        let ev = rx.recv().await.unwrap();
        match ev.kind {
            EventKind::Observation { content } => assert_eq!(content, "persisted"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
