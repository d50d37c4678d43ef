use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::workflow::ConnectionStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NetworkConnection {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub status: ConnectionStatus,
    pub message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub responded_at: Option<OffsetDateTime>,
}

impl NetworkConnection {
    pub async fn create(
        db: &PgPool,
        from_user_id: Uuid,
        to_user_id: Uuid,
        message: Option<&str>,
    ) -> anyhow::Result<NetworkConnection> {
        let row = sqlx::query_as::<_, NetworkConnection>(
            r#"
            INSERT INTO network_connections (from_user_id, to_user_id, message)
            VALUES ($1, $2, $3)
            RETURNING id, from_user_id, to_user_id, status, message, created_at, responded_at
            "#,
        )
        .bind(from_user_id)
        .bind(to_user_id)
        .bind(message)
        .fetch_one(db)
        .await
        .context("insert connection")?;
        Ok(row)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<NetworkConnection>> {
        let row = sqlx::query_as::<_, NetworkConnection>(
            r#"
            SELECT id, from_user_id, to_user_id, status, message, created_at, responded_at
            FROM network_connections
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find connection")?;
        Ok(row)
    }

    /// Most recent record between two users, in either direction.
    pub async fn latest_between(
        db: &PgPool,
        a: Uuid,
        b: Uuid,
    ) -> anyhow::Result<Option<NetworkConnection>> {
        let row = sqlx::query_as::<_, NetworkConnection>(
            r#"
            SELECT id, from_user_id, to_user_id, status, message, created_at, responded_at
            FROM network_connections
            WHERE (from_user_id = $1 AND to_user_id = $2)
               OR (from_user_id = $2 AND to_user_id = $1)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(db)
        .await
        .context("find connection between users")?;
        Ok(row)
    }

    pub async fn count_sent_since(
        db: &PgPool,
        from_user_id: Uuid,
        since: OffsetDateTime,
    ) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query_scalar(
            r#"SELECT count(*) FROM network_connections WHERE from_user_id = $1 AND created_at >= $2"#,
        )
        .bind(from_user_id)
        .bind(since)
        .fetch_one(db)
        .await
        .context("count sent requests")?;
        Ok(n)
    }

    pub async fn list_incoming_pending(
        db: &PgPool,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<NetworkConnection>> {
        let rows = sqlx::query_as::<_, NetworkConnection>(
            r#"
            SELECT id, from_user_id, to_user_id, status, message, created_at, responded_at
            FROM network_connections
            WHERE to_user_id = $1 AND status = 'pending'
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list incoming requests")?;
        Ok(rows)
    }

    pub async fn list_connected(
        db: &PgPool,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<NetworkConnection>> {
        let rows = sqlx::query_as::<_, NetworkConnection>(
            r#"
            SELECT id, from_user_id, to_user_id, status, message, created_at, responded_at
            FROM network_connections
            WHERE (from_user_id = $1 OR to_user_id = $1) AND status = 'connected'
            ORDER BY responded_at DESC NULLS LAST
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list connections")?;
        Ok(rows)
    }

    /// Resolve a request. Guarded on `pending` so two racing responses cannot
    /// both apply; returns `None` when the row was no longer pending.
    pub async fn resolve(
        db: &PgPool,
        id: Uuid,
        status: ConnectionStatus,
    ) -> anyhow::Result<Option<NetworkConnection>> {
        let row = sqlx::query_as::<_, NetworkConnection>(
            r#"
            UPDATE network_connections
               SET status = $2, responded_at = now()
             WHERE id = $1 AND status = 'pending'
            RETURNING id, from_user_id, to_user_id, status, message, created_at, responded_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(db)
        .await
        .context("resolve connection")?;
        Ok(row)
    }
}
