use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::PublicUser,
    moderation::{plan, ModerationAction},
    repo_types::{User, UserBan, UserStatus},
};
use crate::{
    auth::extractors::Actor,
    error::{ApiError, ApiResult},
};

/// Load the caller and refuse anyone who is not approved (admins pass).
pub async fn require_active(db: &PgPool, actor: &Actor) -> ApiResult<User> {
    let user = User::find_by_id(db, actor.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
    if !user.is_active() {
        warn!(user_id = %user.id, status = ?user.status, "inactive user attempted action");
        let msg = match user.status {
            UserStatus::Banned => "Account is banned",
            UserStatus::Rejected => "Account was rejected",
            _ => "Account is awaiting approval",
        };
        return Err(ApiError::Forbidden(msg.into()));
    }
    Ok(user)
}

#[derive(Debug, Serialize)]
pub struct ModerationOutcome {
    pub user: PublicUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban: Option<UserBan>,
}

/// Plan and apply `action` against the target row while holding its lock,
/// so concurrent moderation or billing updates are not overwritten.
pub async fn moderate(
    db: &PgPool,
    admin: &Actor,
    target_id: Uuid,
    action: ModerationAction,
) -> ApiResult<ModerationOutcome> {
    require_active(db, admin).await?;

    let mut tx = db.begin().await?;
    let target = User::lock_for_update(&mut *tx, target_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let transition = plan(admin.id, &target, &action, OffsetDateTime::now_utc()).map_err(|e| {
        warn!(actor_id = %admin.id, user_id = %target_id, action = action.name(), error = %e, "moderation refused");
        ApiError::from(e)
    })?;

    let (user, ban) = User::apply_transition(&mut *tx, target_id, admin.id, &transition).await?;
    tx.commit().await?;

    info!(
        actor_id = %admin.id,
        user_id = %user.id,
        action = action.name(),
        status = ?user.status,
        tier = ?user.tier,
        "moderation applied"
    );
    Ok(ModerationOutcome {
        user: PublicUser::from(user),
        ban,
    })
}
