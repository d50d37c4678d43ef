use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account kind chosen at registration; never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    VentureCapitalist,
    Startup,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Student,
        Role::VentureCapitalist,
        Role::Startup,
        Role::Admin,
    ];

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    /// Roles allowed to publish job postings.
    pub fn can_post_jobs(self) -> bool {
        matches!(self, Role::Startup | Role::VentureCapitalist | Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_tier", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    pub const ALL: [Tier; 2] = [Tier::Free, Tier::Premium];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Pending,
    Approved,
    Rejected,
    Banned,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub role: Role,
    pub tier: Tier,
    pub status: UserStatus,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Approved users may act on the platform. Admins may too unless banned.
    pub fn is_active(&self) -> bool {
        match self.status {
            UserStatus::Approved => true,
            UserStatus::Banned => false,
            UserStatus::Pending | UserStatus::Rejected => self.role.is_admin(),
        }
    }
}

/// One row of ban history. Rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserBan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub banned_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub banned_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>, // None = permanent
    #[serde(with = "time::serde::rfc3339::option")]
    pub lifted_at: Option<OffsetDateTime>,
    pub lifted_by: Option<Uuid>,
}

impl UserBan {
    pub fn is_in_force(&self, now: OffsetDateTime) -> bool {
        self.lifted_at.is_none() && self.expires_at.map_or(true, |exp| exp > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, status: UserStatus) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            username: "u".into(),
            email: "u@example.com".into(),
            password_hash: String::new(),
            role,
            tier: Tier::Free,
            status,
            referral_code: "AAAAAAAA".into(),
            referred_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn banned_admin_is_not_active() {
        assert!(!user(Role::Admin, UserStatus::Banned).is_active());
        assert!(user(Role::Admin, UserStatus::Pending).is_active());
        assert!(user(Role::Admin, UserStatus::Approved).is_active());
    }

    #[test]
    fn only_approved_members_are_active() {
        assert!(user(Role::Student, UserStatus::Approved).is_active());
        assert!(!user(Role::Student, UserStatus::Pending).is_active());
        assert!(!user(Role::Startup, UserStatus::Rejected).is_active());
        assert!(!user(Role::VentureCapitalist, UserStatus::Banned).is_active());
    }
}
