//! Subscription events posted by the payment provider.

use ring::hmac::{self, Key, HMAC_SHA256};
use serde::Deserialize;
use uuid::Uuid;

use crate::users::repo_types::Tier;

pub const SIGNATURE_HEADER: &str = "x-billing-signature";

fn key(secret: &str) -> Key {
    Key::new(HMAC_SHA256, secret.as_bytes())
}

/// Hex HMAC-SHA256 of the raw body.
pub fn sign(secret: &str, body: &[u8]) -> String {
    hex::encode(hmac::sign(&key(secret), body).as_ref())
}

pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    match hex::decode(signature.trim()) {
        Ok(tag) => hmac::verify(&key(secret), body, &tag).is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, Deserialize)]
pub struct BillingEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

impl BillingEvent {
    /// Tier the event moves the user to, or `None` for events we ignore.
    pub fn target_tier(&self) -> Option<Tier> {
        match self.kind.as_str() {
            "subscription.activated" | "subscription.renewed" => Some(Tier::Premium),
            "subscription.canceled" | "subscription.expired" => Some(Tier::Free),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrip_and_tamper() {
        let body = br#"{"type":"subscription.activated","user_id":"00000000-0000-0000-0000-000000000001"}"#;
        let sig = sign("whsec", body);
        assert_eq!(sig.len(), 64);
        assert!(verify_signature("whsec", body, &sig));
        assert!(verify_signature("whsec", body, &sig.to_uppercase()));
        assert!(!verify_signature("other", body, &sig));
        assert!(!verify_signature("whsec", b"{}", &sig));
        assert!(!verify_signature("whsec", body, ""));
    }

    #[test]
    fn rfc4231_test_case_2() {
        assert_eq!(
            sign("Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn non_hex_signature_is_rejected() {
        assert!(!verify_signature("whsec", b"{}", "not-hex"));
    }

    #[test]
    fn events_map_to_tiers() {
        let ev = |kind: &str| BillingEvent {
            kind: kind.into(),
            user_id: None,
        };
        assert_eq!(ev("subscription.activated").target_tier(), Some(Tier::Premium));
        assert_eq!(ev("subscription.renewed").target_tier(), Some(Tier::Premium));
        assert_eq!(ev("subscription.canceled").target_tier(), Some(Tier::Free));
        assert_eq!(ev("subscription.expired").target_tier(), Some(Tier::Free));
        assert_eq!(ev("invoice.paid").target_tier(), None);
    }

    #[test]
    fn unknown_event_without_user_parses() {
        let ev: BillingEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(ev.user_id.is_none());
        assert!(ev.target_tier().is_none());
    }
}
