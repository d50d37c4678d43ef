//! Admin moderation of user accounts.
//!
//! `plan` decides what a moderation action does to a user without touching
//! the database; the repo layer then applies the resulting [`Transition`].

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Tier, User, UserBan, UserStatus};
use crate::error::ApiError;

const MAX_REASON_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ModerationAction {
    Ban {
        reason: String,
        #[serde(default, with = "time::serde::rfc3339::option")]
        expires_at: Option<OffsetDateTime>,
    },
    Unban,
    SetTier {
        tier: Tier,
    },
    Approve,
    Reject,
}

impl ModerationAction {
    pub fn name(&self) -> &'static str {
        match self {
            ModerationAction::Ban { .. } => "ban",
            ModerationAction::Unban => "unban",
            ModerationAction::SetTier { .. } => "set_tier",
            ModerationAction::Approve => "approve",
            ModerationAction::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBan {
    pub reason: String,
    pub expires_at: Option<OffsetDateTime>,
}

/// Resulting user row plus the history side effects to persist with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: UserStatus,
    pub tier: Tier,
    pub record_ban: Option<NewBan>,
    pub lift_bans: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModerationError {
    #[error("ban reason is required")]
    MissingReason,

    #[error("ban reason must be at most 500 characters")]
    ReasonTooLong,

    #[error("ban expiry must be in the future")]
    ExpiryInPast,

    #[error("admins cannot {0} themselves")]
    SelfModeration(&'static str),

    #[error("cannot {action} a user whose status is {from:?}")]
    InvalidTransition {
        action: &'static str,
        from: UserStatus,
    },
}

impl From<ModerationError> for ApiError {
    fn from(e: ModerationError) -> Self {
        match e {
            ModerationError::InvalidTransition { .. } => ApiError::Conflict(e.to_string()),
            _ => ApiError::Validation(e.to_string()),
        }
    }
}

pub fn plan(
    actor_id: Uuid,
    target: &User,
    action: &ModerationAction,
    now: OffsetDateTime,
) -> Result<Transition, ModerationError> {
    let unchanged = Transition {
        status: target.status,
        tier: target.tier,
        record_ban: None,
        lift_bans: false,
    };

    if target.id == actor_id && !matches!(action, ModerationAction::SetTier { .. }) {
        return Err(ModerationError::SelfModeration(action.name()));
    }

    match action {
        ModerationAction::Ban { reason, expires_at } => {
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(ModerationError::MissingReason);
            }
            if reason.chars().count() > MAX_REASON_LEN {
                return Err(ModerationError::ReasonTooLong);
            }
            if matches!(expires_at, Some(exp) if *exp <= now) {
                return Err(ModerationError::ExpiryInPast);
            }
            // Banning an already banned user still appends a history row.
            Ok(Transition {
                status: UserStatus::Banned,
                record_ban: Some(NewBan {
                    reason: reason.to_string(),
                    expires_at: *expires_at,
                }),
                ..unchanged
            })
        }
        ModerationAction::Unban => match target.status {
            UserStatus::Banned => Ok(Transition {
                status: UserStatus::Approved,
                lift_bans: true,
                ..unchanged
            }),
            from => Err(ModerationError::InvalidTransition {
                action: "unban",
                from,
            }),
        },
        ModerationAction::SetTier { tier } => Ok(Transition {
            tier: *tier,
            ..unchanged
        }),
        ModerationAction::Approve => match target.status {
            UserStatus::Pending | UserStatus::Rejected | UserStatus::Approved => Ok(Transition {
                status: UserStatus::Approved,
                ..unchanged
            }),
            from => Err(ModerationError::InvalidTransition {
                action: "approve",
                from,
            }),
        },
        ModerationAction::Reject => match target.status {
            UserStatus::Pending | UserStatus::Rejected => Ok(Transition {
                status: UserStatus::Rejected,
                ..unchanged
            }),
            from => Err(ModerationError::InvalidTransition {
                action: "reject",
                from,
            }),
        },
    }
}

/// A banned user whose every ban has expired may be restored on next login.
pub fn ban_has_lapsed(user: &User, history: &[UserBan], now: OffsetDateTime) -> bool {
    user.status == UserStatus::Banned
        && !history.is_empty()
        && history.iter().all(|b| !b.is_in_force(now))
}
