//! Connection requests between two users.
//!
//! A request is created `pending` by the requester and resolved once, by the
//! recipient, to `connected` or `rejected`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{entitlements::LimitSet, error::ApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "connection_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Pending,
    Connected,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionResponse {
    Accept,
    Reject,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("cannot connect with yourself")]
    SelfRequest,

    #[error("a connection with this user is already {0:?}")]
    AlreadyLinked(ConnectionStatus),

    #[error("intro messages require a premium plan")]
    IntroNotAllowed,

    #[error("weekly connection requests")]
    WeeklyLimit,

    #[error("only the recipient can respond to this request")]
    NotRecipient,

    #[error("request was already resolved as {0:?}")]
    AlreadyResolved(ConnectionStatus),

    #[error("intro message must be at most 1000 characters")]
    MessageTooLong,
}

impl From<NetworkError> for ApiError {
    fn from(e: NetworkError) -> Self {
        match e {
            NetworkError::SelfRequest | NetworkError::MessageTooLong => {
                ApiError::Validation(e.to_string())
            }
            NetworkError::AlreadyLinked(_) | NetworkError::AlreadyResolved(_) => {
                ApiError::Conflict(e.to_string())
            }
            NetworkError::IntroNotAllowed | NetworkError::WeeklyLimit => {
                ApiError::LimitReached(e.to_string())
            }
            NetworkError::NotRecipient => ApiError::Forbidden(e.to_string()),
        }
    }
}

const MAX_MESSAGE_LEN: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct NewRequestCheck<'a> {
    pub from: Uuid,
    pub to: Uuid,
    /// Status of the latest link between the pair, in either direction.
    pub existing: Option<ConnectionStatus>,
    pub message: Option<&'a str>,
    pub limits: &'a LimitSet,
    pub sent_this_week: i64,
}

/// Validate a new request. Returns the trimmed intro message, if any.
pub fn check_request<'a>(c: NewRequestCheck<'a>) -> Result<Option<&'a str>, NetworkError> {
    if c.from == c.to {
        return Err(NetworkError::SelfRequest);
    }
    // Only live links block; a rejected request may be sent again.
    if let Some(status @ (ConnectionStatus::Pending | ConnectionStatus::Connected)) = c.existing {
        return Err(NetworkError::AlreadyLinked(status));
    }
    let message = c.message.map(str::trim).filter(|m| !m.is_empty());
    if let Some(m) = message {
        if !c.limits.can_request_intros {
            return Err(NetworkError::IntroNotAllowed);
        }
        if m.chars().count() > MAX_MESSAGE_LEN {
            return Err(NetworkError::MessageTooLong);
        }
    }
    if !c.limits.weekly_connection_requests.allows(c.sent_this_week) {
        return Err(NetworkError::WeeklyLimit);
    }
    Ok(message)
}

pub fn respond(
    recipient: Uuid,
    current: ConnectionStatus,
    actor_id: Uuid,
    response: ConnectionResponse,
) -> Result<ConnectionStatus, NetworkError> {
    if actor_id != recipient {
        return Err(NetworkError::NotRecipient);
    }
    if current != ConnectionStatus::Pending {
        return Err(NetworkError::AlreadyResolved(current));
    }
    Ok(match response {
        ConnectionResponse::Accept => ConnectionStatus::Connected,
        ConnectionResponse::Reject => ConnectionStatus::Rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlements::limits;
    use crate::users::repo_types::{Role, Tier};

    fn check<'a>(
        from: Uuid,
        to: Uuid,
        existing: Option<ConnectionStatus>,
        message: Option<&'a str>,
        limits: &'a LimitSet,
        sent_this_week: i64,
    ) -> Result<Option<&'a str>, NetworkError> {
        check_request(NewRequestCheck {
            from,
            to,
            existing,
            message,
            limits,
            sent_this_week,
        })
    }

    #[test]
    fn recipient_accepts_or_rejects_pending() {
        let recipient = Uuid::new_v4();
        assert_eq!(
            respond(recipient, ConnectionStatus::Pending, recipient, ConnectionResponse::Accept),
            Ok(ConnectionStatus::Connected)
        );
        assert_eq!(
            respond(recipient, ConnectionStatus::Pending, recipient, ConnectionResponse::Reject),
            Ok(ConnectionStatus::Rejected)
        );
    }

    #[test]
    fn requester_cannot_respond() {
        let (requester, recipient) = (Uuid::new_v4(), Uuid::new_v4());
        let err = respond(recipient, ConnectionStatus::Pending, requester, ConnectionResponse::Accept)
            .unwrap_err();
        assert_eq!(err, NetworkError::NotRecipient);
        assert!(matches!(ApiError::from(err), ApiError::Forbidden(_)));
    }

    #[test]
    fn resolved_requests_are_final() {
        let recipient = Uuid::new_v4();
        for current in [ConnectionStatus::Connected, ConnectionStatus::Rejected] {
            let err = respond(recipient, current, recipient, ConnectionResponse::Accept).unwrap_err();
            assert_eq!(err, NetworkError::AlreadyResolved(current));
            assert!(matches!(ApiError::from(err), ApiError::Conflict(_)));
        }
    }

    #[test]
    fn cannot_request_self() {
        let me = Uuid::new_v4();
        let l = limits(Role::Student, Tier::Free);
        assert_eq!(check(me, me, None, None, &l, 0), Err(NetworkError::SelfRequest));
    }

    #[test]
    fn live_link_blocks_new_request_but_rejection_does_not() {
        let l = limits(Role::Student, Tier::Free);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            check(a, b, Some(ConnectionStatus::Pending), None, &l, 0),
            Err(NetworkError::AlreadyLinked(ConnectionStatus::Pending))
        );
        assert_eq!(
            check(a, b, Some(ConnectionStatus::Connected), None, &l, 0),
            Err(NetworkError::AlreadyLinked(ConnectionStatus::Connected))
        );
        assert_eq!(check(a, b, Some(ConnectionStatus::Rejected), None, &l, 0), Ok(None));
    }

    #[test]
    fn intro_message_needs_entitlement() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let free = limits(Role::Student, Tier::Free);
        let premium = limits(Role::Student, Tier::Premium);
        assert_eq!(
            check(a, b, None, Some("hello"), &free, 0),
            Err(NetworkError::IntroNotAllowed)
        );
        assert_eq!(check(a, b, None, Some(" hello "), &premium, 0), Ok(Some("hello")));
        // A blank message is treated as no message.
        assert_eq!(check(a, b, None, Some("   "), &free, 0), Ok(None));
    }

    #[test]
    fn weekly_quota_is_enforced() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let free = limits(Role::Student, Tier::Free);
        assert!(check(a, b, None, None, &free, 9).is_ok());
        assert_eq!(check(a, b, None, None, &free, 10), Err(NetworkError::WeeklyLimit));
        let admin = limits(Role::Admin, Tier::Free);
        assert!(check(a, b, None, None, &admin, 10_000).is_ok());
    }
}
