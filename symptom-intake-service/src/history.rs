//! Append-only chat history, written by the HTTP layer after each turn.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub session_id: String,
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    async fn append(&self, session_id: &str, message: &str, response: &str) -> anyhow::Result<()>;

    async fn history(&self, session_id: &str) -> anyhow::Result<Vec<ChatRecord>>;
}

/// In-memory implementation of ChatHistoryStore
#[derive(Clone, Default)]
pub struct InMemoryChatHistory {
    records: Arc<DashMap<String, Vec<ChatRecord>>>,
}

impl InMemoryChatHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatHistoryStore for InMemoryChatHistory {
    async fn append(&self, session_id: &str, message: &str, response: &str) -> anyhow::Result<()> {
        self.records
            .entry(session_id.to_string())
            .or_default()
            .push(ChatRecord {
                session_id: session_id.to_string(),
                message: message.to_string(),
                response: response.to_string(),
                timestamp: Utc::now(),
            });
        Ok(())
    }

    async fn history(&self, session_id: &str) -> anyhow::Result<Vec<ChatRecord>> {
        Ok(self
            .records
            .get(session_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

/// PostgreSQL implementation of ChatHistoryStore
pub struct PostgresChatHistory {
    pool: PgPool,
}

impl PostgresChatHistory {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.migrate().await?;
        info!("Connected to PostgreSQL chat history");
        Ok(storage)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_sessions (
                id BIGSERIAL PRIMARY KEY,
                session_id TEXT UNIQUE NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id BIGSERIAL PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES chat_sessions (session_id),
                message TEXT NOT NULL,
                response TEXT NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ChatHistoryStore for PostgresChatHistory {
    async fn append(&self, session_id: &str, message: &str, response: &str) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO chat_sessions (session_id) VALUES ($1) ON CONFLICT (session_id) DO NOTHING",
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO messages (session_id, message, response) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(message)
            .bind(response)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn history(&self, session_id: &str) -> anyhow::Result<Vec<ChatRecord>> {
        let rows = sqlx::query_as::<_, (String, String, String, DateTime<Utc>)>(
            "SELECT session_id, message, response, timestamp FROM messages WHERE session_id = $1 ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(session_id, message, response, timestamp)| ChatRecord {
                session_id,
                message,
                response,
                timestamp,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_history_appends_per_session() {
        let history = InMemoryChatHistory::new();
        history.append("s1", "hi", "hello").await.unwrap();
        history.append("s1", "headache", "how long?").await.unwrap();
        history.append("s2", "cough", "since when?").await.unwrap();

        let s1 = history.history("s1").await.unwrap();
        assert_eq!(s1.len(), 2);
        assert_eq!(s1[1].message, "headache");
        assert_eq!(s1[1].response, "how long?");
        assert!(history.history("missing").await.unwrap().is_empty());
    }
}
