//! Who may see and change a job application.
//!
//! Status changes are not ordered: the hiring user may move an application
//! to any status from any other, including back out of accepted/rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{auth::extractors::Actor, error::ApiError, users::repo_types::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Reviewed,
    Interviewing,
    Accepted,
    Rejected,
}

/// How the caller relates to an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Applicant,
    HiringUser,
    Admin,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("only the hiring user can change an application's status")]
    NotHiringUser,

    #[error("not allowed to view this application")]
    NotVisible,

    #[error("only students can apply to jobs")]
    NotAStudent,

    #[error("cannot apply to your own posting")]
    OwnPosting,

    #[error("this job is no longer accepting applications")]
    JobClosed,

    #[error("already applied to this job")]
    AlreadyApplied,

    #[error("cover letter must be at most 5000 characters")]
    CoverLetterTooLong,

    #[error("resume does not belong to the applicant")]
    ForeignResume,
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        match e {
            ApplicationError::NotHiringUser
            | ApplicationError::NotVisible
            | ApplicationError::NotAStudent => ApiError::Forbidden(e.to_string()),
            ApplicationError::JobClosed | ApplicationError::AlreadyApplied => {
                ApiError::Conflict(e.to_string())
            }
            ApplicationError::OwnPosting
            | ApplicationError::CoverLetterTooLong
            | ApplicationError::ForeignResume => ApiError::Validation(e.to_string()),
        }
    }
}

const MAX_COVER_LETTER_LEN: usize = 5000;

pub fn viewer(actor: &Actor, applicant_id: Uuid, job_poster: Uuid) -> Result<Viewer, ApplicationError> {
    if actor.id == job_poster {
        Ok(Viewer::HiringUser)
    } else if actor.id == applicant_id {
        Ok(Viewer::Applicant)
    } else if actor.role.is_admin() {
        Ok(Viewer::Admin)
    } else {
        Err(ApplicationError::NotVisible)
    }
}

/// Only the poster of the job may set a new status; any target is accepted.
pub fn change_status(
    actor_id: Uuid,
    job_poster: Uuid,
    next: ApplicationStatus,
) -> Result<ApplicationStatus, ApplicationError> {
    if actor_id != job_poster {
        return Err(ApplicationError::NotHiringUser);
    }
    Ok(next)
}

/// Everything about a new application that can be checked without the
/// database. Returns the trimmed cover letter.
pub fn check_submission<'a>(
    actor: &Actor,
    job_poster: Uuid,
    job_open: bool,
    cover_letter: Option<&'a str>,
    resume_key: Option<&str>,
) -> Result<Option<&'a str>, ApplicationError> {
    if actor.role != Role::Student {
        return Err(ApplicationError::NotAStudent);
    }
    if actor.id == job_poster {
        return Err(ApplicationError::OwnPosting);
    }
    if !job_open {
        return Err(ApplicationError::JobClosed);
    }
    let cover_letter = cover_letter.map(str::trim).filter(|c| !c.is_empty());
    if cover_letter.map_or(false, |c| c.chars().count() > MAX_COVER_LETTER_LEN) {
        return Err(ApplicationError::CoverLetterTooLong);
    }
    if let Some(key) = resume_key {
        if !key.starts_with(&resume_prefix(actor.id)) {
            return Err(ApplicationError::ForeignResume);
        }
    }
    Ok(cover_letter)
}

pub fn resume_prefix(user_id: Uuid) -> String {
    format!("resumes/{}/", user_id)
}

/// File extension for accepted resume uploads.
pub fn resume_extension(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime {
        "application/pdf" => Some("pdf"),
        "application/msword" => Some("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn hiring_user_may_set_any_status() {
        let poster = Uuid::new_v4();
        for next in [
            ApplicationStatus::Reviewed,
            ApplicationStatus::Accepted,
            ApplicationStatus::Pending,
            ApplicationStatus::Rejected,
        ] {
            assert_eq!(change_status(poster, poster, next), Ok(next));
        }
    }

    #[test]
    fn others_cannot_change_status() {
        let poster = Uuid::new_v4();
        let err = change_status(Uuid::new_v4(), poster, ApplicationStatus::Accepted).unwrap_err();
        assert_eq!(err, ApplicationError::NotHiringUser);
        assert!(matches!(ApiError::from(err), ApiError::Forbidden(_)));
    }

    #[test]
    fn viewer_resolution() {
        let applicant = actor(Role::Student);
        let poster = actor(Role::Startup);
        let admin = actor(Role::Admin);
        let stranger = actor(Role::Student);

        assert_eq!(viewer(&applicant, applicant.id, poster.id), Ok(Viewer::Applicant));
        assert_eq!(viewer(&poster, applicant.id, poster.id), Ok(Viewer::HiringUser));
        assert_eq!(viewer(&admin, applicant.id, poster.id), Ok(Viewer::Admin));
        assert_eq!(
            viewer(&stranger, applicant.id, poster.id),
            Err(ApplicationError::NotVisible)
        );
    }

    #[test]
    fn submission_rules() {
        let student = actor(Role::Student);
        let poster = Uuid::new_v4();

        assert_eq!(
            check_submission(&actor(Role::Startup), poster, true, None, None),
            Err(ApplicationError::NotAStudent)
        );
        assert_eq!(
            check_submission(&student, student.id, true, None, None),
            Err(ApplicationError::OwnPosting)
        );
        assert_eq!(
            check_submission(&student, poster, false, None, None),
            Err(ApplicationError::JobClosed)
        );
        assert_eq!(
            check_submission(&student, poster, true, Some("  hi  "), None),
            Ok(Some("hi"))
        );
        assert_eq!(check_submission(&student, poster, true, Some("   "), None), Ok(None));
    }

    #[test]
    fn submission_rejects_long_cover_letter() {
        let student = actor(Role::Student);
        let letter = "a".repeat(MAX_COVER_LETTER_LEN + 1);
        assert_eq!(
            check_submission(&student, Uuid::new_v4(), true, Some(&letter), None),
            Err(ApplicationError::CoverLetterTooLong)
        );
    }

    #[test]
    fn submission_rejects_someone_elses_resume() {
        let student = actor(Role::Student);
        let own = format!("{}abc.pdf", resume_prefix(student.id));
        let foreign = format!("{}abc.pdf", resume_prefix(Uuid::new_v4()));
        assert!(check_submission(&student, Uuid::new_v4(), true, None, Some(&own)).is_ok());
        assert_eq!(
            check_submission(&student, Uuid::new_v4(), true, None, Some(&foreign)),
            Err(ApplicationError::ForeignResume)
        );
    }

    #[test]
    fn resume_content_types() {
        assert_eq!(resume_extension("application/pdf"), Some("pdf"));
        assert_eq!(resume_extension("application/pdf; charset=binary"), Some("pdf"));
        assert_eq!(resume_extension("application/msword"), Some("doc"));
        assert_eq!(
            resume_extension("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            Some("docx")
        );
        assert_eq!(resume_extension("image/png"), None);
    }

    #[test]
    fn status_wire_format() {
        let s: ApplicationStatus = serde_json::from_str(r#""interviewing""#).unwrap();
        assert_eq!(s, ApplicationStatus::Interviewing);
        assert!(serde_json::from_str::<ApplicationStatus>(r#""hired""#).is_err());
    }
}
