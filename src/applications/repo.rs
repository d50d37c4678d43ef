use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::workflow::ApplicationStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobApplication {
    pub id: Uuid,
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub status: ApplicationStatus,
    pub resume_key: Option<String>, // object store key, presigned on read
    pub cover_letter: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Application joined with the poster of its job.
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationWithPoster {
    #[sqlx(flatten)]
    pub application: JobApplication,
    pub job_poster: Uuid,
}

impl JobApplication {
    pub async fn create(
        db: &PgPool,
        job_id: Uuid,
        user_id: Uuid,
        resume_key: Option<&str>,
        cover_letter: Option<&str>,
    ) -> anyhow::Result<JobApplication> {
        let row = sqlx::query_as::<_, JobApplication>(
            r#"
            INSERT INTO job_applications (job_id, user_id, resume_key, cover_letter)
            VALUES ($1, $2, $3, $4)
            RETURNING id, job_id, user_id, status, resume_key, cover_letter, created_at, updated_at
            "#,
        )
        .bind(job_id)
        .bind(user_id)
        .bind(resume_key)
        .bind(cover_letter)
        .fetch_one(db)
        .await
        .context("insert application")?;
        Ok(row)
    }

    pub async fn find_with_poster(
        db: &PgPool,
        id: Uuid,
    ) -> anyhow::Result<Option<ApplicationWithPoster>> {
        let row = sqlx::query_as::<_, ApplicationWithPoster>(
            r#"
            SELECT a.id, a.job_id, a.user_id, a.status, a.resume_key, a.cover_letter,
                   a.created_at, a.updated_at, j.posted_by AS job_poster
            FROM job_applications a
            JOIN jobs j ON j.id = a.job_id
            WHERE a.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find application")?;
        Ok(row)
    }

    pub async fn exists_for(db: &PgPool, job_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM job_applications WHERE job_id = $1 AND user_id = $2)"#,
        )
        .bind(job_id)
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("check existing application")?;
        Ok(exists)
    }

    pub async fn count_since(
        db: &PgPool,
        user_id: Uuid,
        since: OffsetDateTime,
    ) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query_scalar(
            r#"SELECT count(*) FROM job_applications WHERE user_id = $1 AND created_at >= $2"#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(db)
        .await
        .context("count applications")?;
        Ok(n)
    }

    pub async fn list_for_job(db: &PgPool, job_id: Uuid) -> anyhow::Result<Vec<JobApplication>> {
        let rows = sqlx::query_as::<_, JobApplication>(
            r#"
            SELECT id, job_id, user_id, status, resume_key, cover_letter, created_at, updated_at
            FROM job_applications
            WHERE job_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(db)
        .await
        .context("list applications for job")?;
        Ok(rows)
    }

    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<JobApplication>> {
        let rows = sqlx::query_as::<_, JobApplication>(
            r#"
            SELECT id, job_id, user_id, status, resume_key, cover_letter, created_at, updated_at
            FROM job_applications
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list applications for user")?;
        Ok(rows)
    }

    /// Overwrites the status unconditionally.
    pub async fn set_status(
        db: &PgPool,
        id: Uuid,
        status: ApplicationStatus,
    ) -> anyhow::Result<JobApplication> {
        let row = sqlx::query_as::<_, JobApplication>(
            r#"
            UPDATE job_applications
               SET status = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, job_id, user_id, status, resume_key, cover_letter, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_one(db)
        .await
        .context("update application status")?;
        Ok(row)
    }
}
