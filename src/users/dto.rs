use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Role, Tier, User, UserStatus};
use crate::{entitlements::LimitSet, pagination::Pagination};

/// Public part of the user returned to clients.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub tier: Tier,
    pub status: UserStatus,
    pub referral_code: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role,
            tier: u.tier,
            status: u.status,
            referral_code: u.referral_code,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub reason: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct TierRequest {
    pub tier: Tier,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub status: Option<UserStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl UserListQuery {
    pub fn pagination(&self) -> Pagination {
        let d = Pagination::default();
        Pagination {
            limit: self.limit.unwrap_or(d.limit),
            offset: self.offset.unwrap_or(d.offset),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Usage {
    pub job_applications_this_month: i64,
    pub connection_requests_this_week: i64,
    pub active_job_postings: i64,
}

#[derive(Debug, Serialize)]
pub struct EntitlementsResponse {
    pub role: Role,
    pub tier: Tier,
    pub limits: LimitSet,
    pub usage: Usage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_hides_password_hash() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: "grace".into(),
            email: "grace@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::VentureCapitalist,
            tier: Tier::Premium,
            status: UserStatus::Approved,
            referral_code: "ZX81ZX81".into(),
            referred_by: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert_eq!(json["role"], "venture_capitalist");
        assert_eq!(json["tier"], "premium");
        assert_eq!(json["status"], "approved");
        assert!(json.get("password_hash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }

    #[test]
    fn ban_request_expiry_is_optional() {
        let b: BanRequest = serde_json::from_str(r#"{"reason":"spam"}"#).unwrap();
        assert_eq!(b.reason, "spam");
        assert!(b.expires_at.is_none());

        let b: BanRequest =
            serde_json::from_str(r#"{"reason":"spam","expires_at":"2030-01-01T00:00:00Z"}"#).unwrap();
        assert!(b.expires_at.is_some());
    }

    #[test]
    fn list_query_defaults() {
        let q = UserListQuery {
            status: None,
            limit: None,
            offset: Some(40),
        };
        let p = q.pagination();
        assert_eq!((p.limit, p.offset), (20, 40));
    }
}
