//! SQL implementation of [`MessageStore`].
//!
//! Every operation borrows the live pool from the [`ConnectionManager`], so
//! connection loss and timeouts are classified in one place. Queries use the
//! runtime-checked `sqlx::query` form with `?` placeholders, which both MySQL
//! and SQLite accept.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use super::connection::ConnectionManager;
use super::schema::Dialect;
use super::{validate_content, Message, MessageStore, StoreError};

/// Message store over the `messages` table.
#[derive(Clone, Debug)]
pub struct SqlMessageStore {
    connections: Arc<ConnectionManager>,
}

impl SqlMessageStore {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }
}

impl MessageStore for SqlMessageStore {
    async fn append(&self, content: &str) -> Result<Message, StoreError> {
        let content = validate_content(content)?;
        // Truncated to what the stored text keeps.
        let created_at = Utc::now().trunc_subsecs(6);
        let stamp = created_at.to_rfc3339_opts(SecondsFormat::Micros, true);

        let body = content.clone();
        let dialect = self.connections.dialect();
        let id = self
            .connections
            .run(|pool| async move {
                match dialect {
                    // The Any driver reports no last insert id for SQLite.
                    Dialect::Sqlite => {
                        sqlx::query_scalar::<_, i64>(
                            "INSERT INTO messages (content, created_at) VALUES (?, ?) RETURNING id",
                        )
                        .bind(body)
                        .bind(stamp)
                        .fetch_one(&pool)
                        .await
                        .map(Some)
                    }
                    Dialect::MySql => {
                        let result = sqlx::query("INSERT INTO messages (content, created_at) VALUES (?, ?)")
                            .bind(body)
                            .bind(stamp)
                            .execute(&pool)
                            .await?;
                        Ok(result.last_insert_id())
                    }
                }
            })
            .await?
            .ok_or_else(|| StoreError::Internal("driver did not report the inserted id".to_owned()))?;

        tracing::info!(id, chars = content.chars().count(), "message added");
        Ok(Message {
            id,
            content,
            created_at,
        })
    }

    async fn list_all(&self) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<(i64, String, String)> = self
            .connections
            .run(|pool| async move {
                sqlx::query_as("SELECT id, content, created_at FROM messages ORDER BY id DESC")
                    .fetch_all(&pool)
                    .await
            })
            .await?;

        tracing::debug!(count = rows.len(), "messages retrieved");
        Ok(rows
            .into_iter()
            .map(|(id, content, created_at)| Message {
                id,
                content,
                created_at: created_at.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
                    tracing::warn!(id, raw = %created_at, error = %e, "failed to parse message created_at; using now");
                    Utc::now()
                }),
            })
            .collect())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;
    use crate::db::testing::{fast_manager, FlakySqlite};
    use crate::db::{ValidationError, MAX_CONTENT_CHARS};

    fn store() -> (SqlMessageStore, crate::db::testing::Switch, tempfile::TempDir) {
        let (connector, switch, dir) = FlakySqlite::new();
        let store = SqlMessageStore::new(Arc::new(fast_manager(connector)));
        (store, switch, dir)
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let (store, _switch, _dir) = store();
        assert!(store.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn append_then_list_contains_new_message_once() {
        let (store, _switch, _dir) = store();
        let first = store.append("first").await.expect("append");
        let second = store.append("  second  ").await.expect("append");

        assert_eq!(second.content, "second");
        assert!(second.id > first.id);

        let listed = store.list_all().await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed.iter().filter(|m| m.content == "second").count(), 1);
        // newest first
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn append_returns_the_stored_id() {
        let (store, _switch, _dir) = store();
        let first = store.append("one").await.expect("append");
        let second = store.append("two").await.expect("append");
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let listed: Vec<(i64, String)> =
            store.list_all().await.expect("list").into_iter().map(|m| (m.id, m.content)).collect();
        assert_eq!(listed, vec![(2, "two".to_owned()), (1, "one".to_owned())]);
    }

    #[tokio::test]
    async fn stored_timestamp_round_trips() {
        let (store, _switch, _dir) = store();
        let created = store.append("hello").await.expect("append");
        let listed = store.list_all().await.expect("list");
        assert_eq!(listed[0].created_at, created.created_at);
    }

    #[tokio::test]
    async fn invalid_content_never_reaches_the_database() {
        let (store, switch, _dir) = store();
        switch.cut();

        for blank in ["", "   "] {
            let err = store.append(blank).await.expect_err("blank");
            assert!(matches!(err, StoreError::Validation(ValidationError::Empty)));
        }
        let err = store
            .append(&"x".repeat(MAX_CONTENT_CHARS + 1))
            .await
            .expect_err("too long");
        assert!(matches!(err, StoreError::Validation(ValidationError::TooLong { .. })));
    }

    #[tokio::test]
    async fn unreachable_store_is_unavailable() {
        let (store, switch, _dir) = store();
        switch.cut();
        assert!(matches!(store.append("hi").await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.list_all().await, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn concurrent_appends_get_distinct_increasing_ids() {
        let (store, _switch, _dir) = store();
        let baseline = store.append("baseline").await.expect("append").id;

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append(&format!("message {i}")).await })
            })
            .collect();

        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            ids.push(task.await.expect("join").expect("append").id);
        }

        let unique: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 50);
        assert!(ids.iter().all(|&id| id > baseline));

        ids.sort_unstable();
        assert_eq!(ids, ((baseline + 1)..=(baseline + 50)).collect::<Vec<_>>());

        let listed = store.list_all().await.expect("list");
        assert_eq!(listed.len(), 51);
        assert!(listed.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[tokio::test]
    async fn data_survives_reconnect() {
        let (store, switch, _dir) = store();
        store.append("before outage").await.expect("append");

        switch.sever().await;
        assert!(store.list_all().await.is_err());

        switch.restore();
        let listed = store.list_all().await.expect("list after restore");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "before outage");
    }
}
