use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{repo::JobApplication, workflow::ApplicationStatus};

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub cover_letter: Option<String>,
    #[serde(default)]
    pub resume_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ApplicationStatus,
}

#[derive(Debug, Serialize)]
pub struct ResumeUploadResponse {
    pub resume_key: String,
}

#[derive(Debug, Serialize)]
pub struct ApplicationView {
    pub id: Uuid,
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub status: ApplicationStatus,
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ApplicationView {
    pub fn new(app: JobApplication, resume_url: Option<String>) -> Self {
        Self {
            id: app.id,
            job_id: app.job_id,
            user_id: app.user_id,
            status: app.status,
            cover_letter: app.cover_letter,
            resume_url,
            created_at: app.created_at,
            updated_at: app.updated_at,
        }
    }
}
