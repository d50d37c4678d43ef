use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::CreateJobRequest,
    repo::{Job, NewJob},
};
use crate::{
    auth::extractors::Actor,
    entitlements::limits,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    pagination::Pagination,
    state::AppState,
    users::{repo_types::User, services::require_active},
};

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/close", post(close_job))
}

/// Trim and length-check a posting before it is stored.
pub(crate) fn validate_job(req: &CreateJobRequest) -> ApiResult<NewJob<'_>> {
    let title = req.title.trim();
    let company = req.company.trim();
    let description = req.description.trim();
    if title.is_empty() || title.chars().count() > 200 {
        return Err(ApiError::Validation("Title must be 1-200 characters".into()));
    }
    if company.is_empty() || company.chars().count() > 200 {
        return Err(ApiError::Validation("Company must be 1-200 characters".into()));
    }
    if description.is_empty() {
        return Err(ApiError::Validation("Description is required".into()));
    }
    let location = req
        .location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());
    Ok(NewJob {
        title,
        company,
        description,
        location,
    })
}

#[instrument(skip(state, payload))]
pub async fn create_job(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    if !actor.role.can_post_jobs() {
        return Err(ApiError::Forbidden("Only startups and investors can post jobs".into()));
    }
    let new = validate_job(&payload)?;
    let user = require_active(&state.db, &actor).await?;

    let quota = limits(user.role, user.tier).active_job_postings;
    let open = Job::count_open_by(&state.db, user.id).await?;
    if !quota.allows(open) {
        warn!(user_id = %user.id, open, "job posting limit reached");
        return Err(ApiError::LimitReached("active job postings".into()));
    }

    let job = Job::create(&state.db, user.id, new).await?;
    info!(job_id = %job.id, user_id = %user.id, "job posted");
    Ok((StatusCode::CREATED, Json(job)))
}

#[instrument(skip(state))]
pub async fn list_jobs(
    State(state): State<AppState>,
    actor: Actor,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<Vec<Job>>> {
    let user = User::find_by_id(&state.db, actor.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
    let visible = limits(user.role, user.tier).visible_jobs;

    // Limited tiers only ever see the newest postings.
    let (limit, offset) = p.clamped();
    let limit = visible.window(limit, offset);
    if limit == 0 {
        return Ok(Json(Vec::new()));
    }

    let jobs = Job::list_open(&state.db, limit, offset).await?;
    Ok(Json(jobs))
}

#[instrument(skip(state))]
pub async fn get_job(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    let job = Job::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("job"))?;
    Ok(Json(job))
}

#[instrument(skip(state))]
pub async fn close_job(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    let job = Job::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("job"))?;
    if job.posted_by != actor.id && !actor.role.is_admin() {
        return Err(ApiError::Forbidden("Only the poster can close this job".into()));
    }
    if !job.is_open {
        return Ok(Json(job));
    }
    let job = Job::close(&state.db, id).await?;
    info!(job_id = %job.id, actor_id = %actor.id, "job closed");
    Ok(Json(job))
}
