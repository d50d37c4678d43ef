//! Entitlement table: what each (role, tier) pair is allowed to do.
//!
//! The table only supplies numbers; callers compare them against usage with
//! [`Limit::allows`] before performing the gated action.

use serde::{Serialize, Serializer};

use crate::users::repo_types::{Role, Tier};

/// A numeric quota. `Unlimited` orders above every `Limited` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Limit {
    Limited(u32),
    Unlimited,
}

impl Limit {
    /// True when one more use fits under the quota.
    pub fn allows(self, used: i64) -> bool {
        match self {
            Limit::Unlimited => true,
            Limit::Limited(max) => used < i64::from(max),
        }
    }

    /// Page size allowed when only the first `max` rows of a listing are
    /// visible. Returns 0 once `offset` is past the visible window.
    pub fn window(self, limit: i64, offset: i64) -> i64 {
        match self {
            Limit::Unlimited => limit,
            Limit::Limited(max) => limit.min((i64::from(max) - offset).max(0)),
        }
    }
}

// Serialized as a number, or null when unlimited.
impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Limit::Limited(n) => s.serialize_some(n),
            Limit::Unlimited => s.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitSet {
    /// Applications within a rolling 30-day window.
    pub job_applications_per_month: Limit,
    /// Connection requests sent within a rolling 7-day window.
    pub weekly_connection_requests: Limit,
    pub visible_jobs: Limit,
    pub active_job_postings: Limit,
    /// Whether a connection request may carry an intro message.
    pub can_request_intros: bool,
}

const UNLIMITED: LimitSet = LimitSet {
    job_applications_per_month: Limit::Unlimited,
    weekly_connection_requests: Limit::Unlimited,
    visible_jobs: Limit::Unlimited,
    active_job_postings: Limit::Unlimited,
    can_request_intros: true,
};

pub fn limits(role: Role, tier: Tier) -> LimitSet {
    use Limit::{Limited, Unlimited};

    match (role, tier) {
        (Role::Student, Tier::Free) => LimitSet {
            job_applications_per_month: Limited(5),
            weekly_connection_requests: Limited(10),
            visible_jobs: Limited(20),
            active_job_postings: Limited(0),
            can_request_intros: false,
        },
        (Role::Student, Tier::Premium) => LimitSet {
            job_applications_per_month: Unlimited,
            weekly_connection_requests: Limited(50),
            visible_jobs: Unlimited,
            active_job_postings: Limited(0),
            can_request_intros: true,
        },
        (Role::VentureCapitalist, Tier::Free) => LimitSet {
            job_applications_per_month: Limited(0),
            weekly_connection_requests: Limited(15),
            visible_jobs: Limited(20),
            active_job_postings: Limited(1),
            can_request_intros: false,
        },
        (Role::VentureCapitalist, Tier::Premium) => LimitSet {
            job_applications_per_month: Limited(0),
            weekly_connection_requests: Unlimited,
            visible_jobs: Unlimited,
            active_job_postings: Limited(10),
            can_request_intros: true,
        },
        (Role::Startup, Tier::Free) => LimitSet {
            job_applications_per_month: Limited(0),
            weekly_connection_requests: Limited(10),
            visible_jobs: Limited(20),
            active_job_postings: Limited(2),
            can_request_intros: false,
        },
        (Role::Startup, Tier::Premium) => LimitSet {
            job_applications_per_month: Limited(0),
            weekly_connection_requests: Limited(100),
            visible_jobs: Unlimited,
            active_job_postings: Unlimited,
            can_request_intros: true,
        },
        (Role::Admin, _) => UNLIMITED,
    }
}
