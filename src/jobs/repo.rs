use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub posted_by: Uuid,
    pub title: String,
    pub company: String,
    pub description: String,
    pub location: Option<String>,
    pub is_open: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub struct NewJob<'a> {
    pub title: &'a str,
    pub company: &'a str,
    pub description: &'a str,
    pub location: Option<&'a str>,
}

impl Job {
    pub async fn create(db: &PgPool, posted_by: Uuid, new: NewJob<'_>) -> anyhow::Result<Job> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (posted_by, title, company, description, location)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, posted_by, title, company, description, location, is_open, created_at
            "#,
        )
        .bind(posted_by)
        .bind(new.title)
        .bind(new.company)
        .bind(new.description)
        .bind(new.location)
        .fetch_one(db)
        .await
        .context("insert job")?;
        Ok(job)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, posted_by, title, company, description, location, is_open, created_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find job")?;
        Ok(job)
    }

    /// Open postings, newest first.
    pub async fn list_open(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, posted_by, title, company, description, location, is_open, created_at
            FROM jobs
            WHERE is_open
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list jobs")?;
        Ok(rows)
    }

    pub async fn count_open_by(db: &PgPool, posted_by: Uuid) -> anyhow::Result<i64> {
        let n: i64 =
            sqlx::query_scalar(r#"SELECT count(*) FROM jobs WHERE posted_by = $1 AND is_open"#)
                .bind(posted_by)
                .fetch_one(db)
                .await
                .context("count open jobs")?;
        Ok(n)
    }

    pub async fn close(db: &PgPool, id: Uuid) -> anyhow::Result<Job> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET is_open = FALSE
             WHERE id = $1
            RETURNING id, posted_by, title, company, description, location, is_open, created_at
            "#,
        )
        .bind(id)
        .fetch_one(db)
        .await
        .context("close job")?;
        Ok(job)
    }
}
