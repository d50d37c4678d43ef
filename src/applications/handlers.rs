use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing::{get, post, put},
    Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{ApplicationView, ApplyRequest, ResumeUploadResponse, UpdateStatusRequest},
    repo::JobApplication,
    workflow::{self, ApplicationError},
};
use crate::{
    auth::extractors::Actor,
    entitlements::limits,
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    jobs::repo::Job,
    state::AppState,
    users::services::require_active,
};

const RESUME_URL_TTL_SECS: u64 = 30 * 60;
const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;
const APPLICATION_WINDOW: Duration = Duration::days(30);

pub fn application_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/:id/applications", post(apply).get(list_for_job))
        .route("/applications/:id", get(get_application))
        .route("/applications/:id/status", put(update_status))
        .route("/me/applications", get(list_mine))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/applications/resume", post(upload_resume))
        .layer(DefaultBodyLimit::max(MAX_RESUME_BYTES))
}

async fn view(state: &AppState, app: JobApplication) -> ApiResult<ApplicationView> {
    let resume_url = match app.resume_key.as_deref() {
        Some(key) => Some(state.storage.presign_get(key, RESUME_URL_TTL_SECS).await?),
        None => None,
    };
    Ok(ApplicationView::new(app, resume_url))
}

#[instrument(skip(state, body))]
pub async fn upload_resume(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ResumeUploadResponse>)> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    let ext = workflow::resume_extension(content_type)
        .ok_or_else(|| ApiError::Validation("Resume must be a PDF or Word document".into()))?;
    if body.is_empty() {
        return Err(ApiError::Validation("Resume file is empty".into()));
    }
    require_active(&state.db, &actor).await?;

    let key = format!("{}{}.{}", workflow::resume_prefix(actor.id), Uuid::new_v4(), ext);
    state.storage.put_object(&key, body, content_type).await?;

    info!(user_id = %actor.id, resume_key = %key, "resume uploaded");
    Ok((StatusCode::CREATED, Json(ResumeUploadResponse { resume_key: key })))
}

#[instrument(skip(state, payload))]
pub async fn apply(
    State(state): State<AppState>,
    actor: Actor,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<ApplyRequest>,
) -> ApiResult<(StatusCode, Json<ApplicationView>)> {
    let job = Job::find_by_id(&state.db, job_id)
        .await?
        .ok_or(ApiError::NotFound("job"))?;

    let cover_letter = workflow::check_submission(
        &actor,
        job.posted_by,
        job.is_open,
        payload.cover_letter.as_deref(),
        payload.resume_key.as_deref(),
    )?;

    let user = require_active(&state.db, &actor).await?;

    if JobApplication::exists_for(&state.db, job.id, user.id).await? {
        return Err(ApplicationError::AlreadyApplied.into());
    }

    let since = OffsetDateTime::now_utc() - APPLICATION_WINDOW;
    let used = JobApplication::count_since(&state.db, user.id, since).await?;
    if !limits(user.role, user.tier).job_applications_per_month.allows(used) {
        warn!(user_id = %user.id, used, "application limit reached");
        return Err(ApiError::LimitReached("job applications this month".into()));
    }

    let app = JobApplication::create(
        &state.db,
        job.id,
        user.id,
        payload.resume_key.as_deref(),
        cover_letter,
    )
    .await?;
    info!(application_id = %app.id, job_id = %job.id, user_id = %user.id, "application submitted");
    Ok((StatusCode::CREATED, Json(view(&state, app).await?)))
}

#[instrument(skip(state))]
pub async fn get_application(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApplicationView>> {
    let found = JobApplication::find_with_poster(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("application"))?;
    workflow::viewer(&actor, found.application.user_id, found.job_poster)?;
    Ok(Json(view(&state, found.application).await?))
}

#[instrument(skip(state))]
pub async fn list_for_job(
    State(state): State<AppState>,
    actor: Actor,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ApplicationView>>> {
    let job = Job::find_by_id(&state.db, job_id)
        .await?
        .ok_or(ApiError::NotFound("job"))?;
    if job.posted_by != actor.id && !actor.role.is_admin() {
        return Err(ApplicationError::NotVisible.into());
    }

    let apps = JobApplication::list_for_job(&state.db, job.id).await?;
    let mut out = Vec::with_capacity(apps.len());
    for app in apps {
        out.push(view(&state, app).await?);
    }
    Ok(Json(out))
}

#[instrument(skip(state))]
pub async fn list_mine(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Vec<ApplicationView>>> {
    let apps = JobApplication::list_for_user(&state.db, actor.id).await?;
    let mut out = Vec::with_capacity(apps.len());
    for app in apps {
        out.push(view(&state, app).await?);
    }
    Ok(Json(out))
}

#[instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<Json<ApplicationView>> {
    let found = JobApplication::find_with_poster(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("application"))?;

    let next = workflow::change_status(actor.id, found.job_poster, payload.status).map_err(|e| {
        warn!(actor_id = %actor.id, application_id = %id, "status change refused");
        ApiError::from(e)
    })?;

    let previous = found.application.status;
    let app = JobApplication::set_status(&state.db, id, next).await?;
    info!(
        application_id = %app.id,
        actor_id = %actor.id,
        from = ?previous,
        to = ?app.status,
        "application status changed"
    );
    Ok(Json(view(&state, app).await?))
}
