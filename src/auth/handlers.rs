use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Router,
};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest},
        extractors::Actor,
        jwt::JwtKeys,
        password::{
            generate_referral_code, hash_password, is_valid_email, is_valid_username,
            verify_password, MIN_PASSWORD_LEN,
        },
    },
    error::{ApiError, ApiResult},
    extract::Json,
    state::AppState,
    users::{
        dto::PublicUser,
        moderation::ban_has_lapsed,
        repo::NewUser,
        repo_types::{Role, User, UserBan, UserStatus},
    },
};

const REFERRAL_CODE_ATTEMPTS: usize = 5;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn issue_tokens(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id, user.role).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        ApiError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(user.id, user.role).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        ApiError::Internal(e)
    })?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

/// Banned users are refused unless every ban on record has expired, in
/// which case the account is restored here.
async fn ensure_not_banned(state: &AppState, user: User) -> ApiResult<User> {
    if user.status != UserStatus::Banned {
        return Ok(user);
    }
    let history = UserBan::list_for_user(&state.db, user.id).await?;
    if ban_has_lapsed(&user, &history, OffsetDateTime::now_utc()) {
        let restored = User::restore_lapsed_ban(&state.db, user.id).await?;
        if restored.status != UserStatus::Banned {
            info!(user_id = %restored.id, "lapsed ban lifted on sign-in");
            return Ok(restored);
        }
    }
    warn!(user_id = %user.id, "banned user attempted sign-in");
    Err(ApiError::Forbidden("Account is banned".into()))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if !is_valid_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err(ApiError::Validation(
            "Username must be 3-32 letters, digits or underscores".into(),
        ));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }
    if payload.role == Role::Admin {
        warn!(email = %payload.email, "self-registration as admin refused");
        return Err(ApiError::Validation("Role cannot be self-assigned".into()));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }
    if User::username_taken(&state.db, &payload.username).await? {
        warn!(username = %payload.username, "username already taken");
        return Err(ApiError::Conflict("Username already taken".into()));
    }

    let referred_by = match payload.referral_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => {
            let code = code.to_ascii_uppercase();
            match User::id_by_referral_code(&state.db, &code).await? {
                Some(id) => Some(id),
                None => return Err(ApiError::Validation("Unknown referral code".into())),
            }
        }
        _ => None,
    };

    let mut referral_code = generate_referral_code();
    for _ in 1..REFERRAL_CODE_ATTEMPTS {
        if User::id_by_referral_code(&state.db, &referral_code).await?.is_none() {
            break;
        }
        referral_code = generate_referral_code();
    }

    let hash = hash_password(&payload.password)?;

    let user = match User::create(
        &state.db,
        NewUser {
            username: &payload.username,
            email: &payload.email,
            password_hash: &hash,
            role: payload.role,
            referral_code: &referral_code,
            referred_by,
        },
    )
    .await
    {
        Ok(u) => u,
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(ApiError::from(e));
        }
    };

    info!(user_id = %user.id, role = ?user.role, "user registered");
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let user = ensure_not_banned(&state, user).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
    let user = ensure_not_banned(&state, user).await?;

    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, actor.id).await?.ok_or_else(|| {
        error!(user_id = %actor.id, "user not found");
        ApiError::Unauthorized("User not found".into())
    })?;
    Ok(Json(PublicUser::from(user)))
}
