use serde::Deserialize;
use uuid::Uuid;

use super::workflow::ConnectionResponse;

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub to_user_id: Uuid,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub action: ConnectionResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respond_request_accepts_only_known_actions() {
        let r: RespondRequest = serde_json::from_str(r#"{"action":"accept"}"#).unwrap();
        assert_eq!(r.action, ConnectionResponse::Accept);
        let r: RespondRequest = serde_json::from_str(r#"{"action":"reject"}"#).unwrap();
        assert_eq!(r.action, ConnectionResponse::Reject);
        assert!(serde_json::from_str::<RespondRequest>(r#"{"action":"maybe"}"#).is_err());
        assert!(serde_json::from_str::<RespondRequest>(r#"{}"#).is_err());
    }

    #[test]
    fn connect_request_message_is_optional() {
        let id = Uuid::new_v4();
        let r: ConnectRequest =
            serde_json::from_str(&format!(r#"{{"to_user_id":"{}"}}"#, id)).unwrap();
        assert_eq!(r.to_user_id, id);
        assert!(r.message.is_none());
    }
}
