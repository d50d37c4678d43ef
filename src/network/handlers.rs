use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{ConnectRequest, RespondRequest},
    repo::NetworkConnection,
    workflow::{self, NetworkError, NewRequestCheck},
};
use crate::{
    auth::extractors::Actor,
    entitlements::limits,
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    state::AppState,
    users::{repo_types::User, services::require_active},
};

const REQUEST_WINDOW: Duration = Duration::days(7);

pub fn network_routes() -> Router<AppState> {
    Router::new()
        .route("/network/requests", post(send_request).get(list_incoming))
        .route("/network/requests/:id/response", post(respond_to_request))
        .route("/network/connections", get(list_connections))
}

#[instrument(skip(state, payload))]
pub async fn send_request(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<ConnectRequest>,
) -> ApiResult<(StatusCode, Json<NetworkConnection>)> {
    if payload.to_user_id == actor.id {
        return Err(NetworkError::SelfRequest.into());
    }
    let user = require_active(&state.db, &actor).await?;
    if User::find_by_id(&state.db, payload.to_user_id).await?.is_none() {
        return Err(ApiError::NotFound("user"));
    }

    let existing = NetworkConnection::latest_between(&state.db, user.id, payload.to_user_id)
        .await?
        .map(|c| c.status);
    let since = OffsetDateTime::now_utc() - REQUEST_WINDOW;
    let sent_this_week = NetworkConnection::count_sent_since(&state.db, user.id, since).await?;
    let user_limits = limits(user.role, user.tier);

    let message = workflow::check_request(NewRequestCheck {
        from: user.id,
        to: payload.to_user_id,
        existing,
        message: payload.message.as_deref(),
        limits: &user_limits,
        sent_this_week,
    })
    .map_err(|e| {
        warn!(user_id = %user.id, to_user_id = %payload.to_user_id, error = %e, "connection request refused");
        ApiError::from(e)
    })?;

    let conn = NetworkConnection::create(&state.db, user.id, payload.to_user_id, message).await?;
    info!(connection_id = %conn.id, from = %conn.from_user_id, to = %conn.to_user_id, "connection requested");
    Ok((StatusCode::CREATED, Json(conn)))
}

#[instrument(skip(state, payload))]
pub async fn respond_to_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> ApiResult<Json<NetworkConnection>> {
    let conn = NetworkConnection::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("connection"))?;

    let next = workflow::respond(conn.to_user_id, conn.status, actor.id, payload.action).map_err(|e| {
        warn!(actor_id = %actor.id, connection_id = %id, error = %e, "connection response refused");
        ApiError::from(e)
    })?;

    // Another response may have landed between the read and this update.
    let conn = match NetworkConnection::resolve(&state.db, id, next).await? {
        Some(c) => c,
        None => {
            let current = NetworkConnection::find_by_id(&state.db, id)
                .await?
                .ok_or(ApiError::NotFound("connection"))?;
            return Err(NetworkError::AlreadyResolved(current.status).into());
        }
    };

    info!(connection_id = %conn.id, actor_id = %actor.id, status = ?conn.status, "connection resolved");
    Ok(Json(conn))
}

#[instrument(skip(state))]
pub async fn list_incoming(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Vec<NetworkConnection>>> {
    let rows = NetworkConnection::list_incoming_pending(&state.db, actor.id).await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn list_connections(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Vec<NetworkConnection>>> {
    let rows = NetworkConnection::list_connected(&state.db, actor.id).await?;
    Ok(Json(rows))
}
