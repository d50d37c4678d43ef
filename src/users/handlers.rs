use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use time::{Duration, OffsetDateTime};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{BanRequest, EntitlementsResponse, PublicUser, TierRequest, Usage, UserListQuery},
    moderation::ModerationAction,
    repo_types::{User, UserBan},
    services::{self, require_active, ModerationOutcome},
};
use crate::{
    applications::repo::JobApplication,
    auth::extractors::{Actor, AdminActor},
    entitlements::limits,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    jobs::repo::Job,
    network::repo::NetworkConnection,
    state::AppState,
};

const MONTH: Duration = Duration::days(30);
const WEEK: Duration = Duration::days(7);

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", get(get_user))
        .route("/admin/users/:id/bans", get(list_bans))
        .route("/admin/users/:id/ban", post(ban_user))
        .route("/admin/users/:id/unban", post(unban_user))
        .route("/admin/users/:id/tier", post(set_tier))
        .route("/admin/users/:id/approve", post(approve_user))
        .route("/admin/users/:id/reject", post(reject_user))
        .route("/admin/users/:id/actions", post(apply_action))
}

pub fn entitlement_routes() -> Router<AppState> {
    Router::new().route("/me/entitlements", get(my_entitlements))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminActor(admin): AdminActor,
    Query(q): Query<UserListQuery>,
) -> ApiResult<Json<Vec<PublicUser>>> {
    require_active(&state.db, &admin).await?;
    let (limit, offset) = q.pagination().clamped();
    let users = User::list(&state.db, q.status, limit, offset).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AdminActor(admin): AdminActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublicUser>> {
    require_active(&state.db, &admin).await?;
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(PublicUser::from(user)))
}

#[instrument(skip(state))]
pub async fn list_bans(
    State(state): State<AppState>,
    AdminActor(admin): AdminActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserBan>>> {
    require_active(&state.db, &admin).await?;
    if User::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound("user"));
    }
    Ok(Json(UserBan::list_for_user(&state.db, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn ban_user(
    State(state): State<AppState>,
    AdminActor(admin): AdminActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<BanRequest>,
) -> ApiResult<Json<ModerationOutcome>> {
    let action = ModerationAction::Ban {
        reason: payload.reason,
        expires_at: payload.expires_at,
    };
    Ok(Json(services::moderate(&state.db, &admin, id, action).await?))
}

#[instrument(skip(state))]
pub async fn unban_user(
    State(state): State<AppState>,
    AdminActor(admin): AdminActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ModerationOutcome>> {
    Ok(Json(
        services::moderate(&state.db, &admin, id, ModerationAction::Unban).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn set_tier(
    State(state): State<AppState>,
    AdminActor(admin): AdminActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<TierRequest>,
) -> ApiResult<Json<ModerationOutcome>> {
    let action = ModerationAction::SetTier { tier: payload.tier };
    Ok(Json(services::moderate(&state.db, &admin, id, action).await?))
}

#[instrument(skip(state))]
pub async fn approve_user(
    State(state): State<AppState>,
    AdminActor(admin): AdminActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ModerationOutcome>> {
    Ok(Json(
        services::moderate(&state.db, &admin, id, ModerationAction::Approve).await?,
    ))
}

#[instrument(skip(state))]
pub async fn reject_user(
    State(state): State<AppState>,
    AdminActor(admin): AdminActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ModerationOutcome>> {
    Ok(Json(
        services::moderate(&state.db, &admin, id, ModerationAction::Reject).await?,
    ))
}

/// Single entry point taking a tagged action body, e.g. `{"action":"unban"}`.
#[instrument(skip(state, action))]
pub async fn apply_action(
    State(state): State<AppState>,
    AdminActor(admin): AdminActor,
    Path(id): Path<Uuid>,
    Json(action): Json<ModerationAction>,
) -> ApiResult<Json<ModerationOutcome>> {
    Ok(Json(services::moderate(&state.db, &admin, id, action).await?))
}

#[instrument(skip(state))]
pub async fn my_entitlements(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<EntitlementsResponse>> {
    let user = User::find_by_id(&state.db, actor.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    let now = OffsetDateTime::now_utc();
    let usage = Usage {
        job_applications_this_month: JobApplication::count_since(&state.db, user.id, now - MONTH)
            .await?,
        connection_requests_this_week: NetworkConnection::count_sent_since(
            &state.db,
            user.id,
            now - WEEK,
        )
        .await?,
        active_job_postings: Job::count_open_by(&state.db, user.id).await?,
    };

    Ok(Json(EntitlementsResponse {
        role: user.role,
        tier: user.tier,
        limits: limits(user.role, user.tier),
        usage,
    }))
}
