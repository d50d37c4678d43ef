use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use super::webhook::{verify_signature, BillingEvent, SIGNATURE_HEADER};
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    users::repo_types::User,
};

pub fn billing_routes() -> Router<AppState> {
    Router::new().route("/billing/webhook", post(billing_webhook))
}

#[instrument(skip(state, headers, body))]
pub async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(&state.config.billing_webhook_secret, &body, signature) {
        warn!("billing webhook signature mismatch");
        return Err(ApiError::Unauthorized("Invalid signature".into()));
    }

    let event: BillingEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("Invalid event: {}", e)))?;

    let Some(tier) = event.target_tier() else {
        debug!(kind = %event.kind, "ignoring billing event");
        return Ok(StatusCode::OK);
    };
    let user_id = event
        .user_id
        .ok_or_else(|| ApiError::Validation("user_id is required".into()))?;

    let user = User::set_tier(&state.db, user_id, tier)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    info!(user_id = %user.id, kind = %event.kind, tier = ?user.tier, "subscription tier updated");
    Ok(StatusCode::OK)
}
