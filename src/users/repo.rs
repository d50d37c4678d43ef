use anyhow::Context;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::moderation::Transition;
use super::repo_types::{Role, Tier, User, UserBan, UserStatus};

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub referral_code: &'a str,
    pub referred_by: Option<Uuid>,
}

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, tier, status,
                   referral_code, referred_by, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, tier, status,
                   referral_code, referred_by, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn username_taken(db: &PgPool, username: &str) -> anyhow::Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE lower(username) = lower($1))"#,
        )
        .bind(username)
        .fetch_one(db)
        .await
        .context("check username")?;
        Ok(taken)
    }

    pub async fn id_by_referral_code(db: &PgPool, code: &str) -> anyhow::Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(r#"SELECT id FROM users WHERE referral_code = $1"#)
            .bind(code)
            .fetch_optional(db)
            .await
            .context("find referral code")?;
        Ok(id)
    }

    /// Insert a new account; status and tier take their column defaults.
    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, role, referral_code, referred_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, email, password_hash, role, tier, status,
                      referral_code, referred_by, created_at, updated_at
            "#,
        )
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.role)
        .bind(new.referral_code)
        .bind(new.referred_by)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    pub async fn list(
        db: &PgPool,
        status: Option<UserStatus>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, tier, status,
                   referral_code, referred_by, created_at, updated_at
            FROM users
            WHERE ($1::user_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list users")?;
        Ok(rows)
    }

    /// Load a user and hold its row lock until the transaction ends.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, tier, status,
                   referral_code, referred_by, created_at, updated_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("lock user")?;
        Ok(user)
    }

    /// Persist a moderation transition planned against a row locked with
    /// [`User::lock_for_update`] on the same connection.
    pub async fn apply_transition(
        conn: &mut PgConnection,
        user_id: Uuid,
        actor_id: Uuid,
        t: &Transition,
    ) -> anyhow::Result<(User, Option<UserBan>)> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET status = $2, tier = $3, updated_at = now()
             WHERE id = $1
            RETURNING id, username, email, password_hash, role, tier, status,
                      referral_code, referred_by, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(t.status)
        .bind(t.tier)
        .fetch_one(&mut *conn)
        .await
        .context("update user status")?;

        let mut recorded = None;
        if let Some(ban) = &t.record_ban {
            let row = sqlx::query_as::<_, UserBan>(
                r#"
                INSERT INTO user_bans (user_id, reason, banned_by, expires_at)
                VALUES ($1, $2, $3, $4)
                RETURNING id, user_id, reason, banned_by, banned_at, expires_at, lifted_at, lifted_by
                "#,
            )
            .bind(user_id)
            .bind(&ban.reason)
            .bind(actor_id)
            .bind(ban.expires_at)
            .fetch_one(&mut *conn)
            .await
            .context("insert ban")?;
            recorded = Some(row);
        }

        if t.lift_bans {
            sqlx::query(
                r#"
                UPDATE user_bans
                   SET lifted_at = now(), lifted_by = $2
                 WHERE user_id = $1 AND lifted_at IS NULL
                "#,
            )
            .bind(user_id)
            .bind(actor_id)
            .execute(&mut *conn)
            .await
            .context("lift bans")?;
        }

        Ok((user, recorded))
    }

    /// Close expired bans and restore the user if no ban is still in force.
    /// Returns the row as it stands afterwards, which may still be banned.
    pub async fn restore_lapsed_ban(db: &PgPool, user_id: Uuid) -> anyhow::Result<User> {
        let mut tx = db.begin().await.context("begin tx")?;

        let user = User::lock_for_update(&mut *tx, user_id)
            .await?
            .context("user vanished during sign-in")?;
        if user.status != UserStatus::Banned {
            tx.commit().await.context("commit tx")?;
            return Ok(user);
        }

        sqlx::query(
            r#"
            UPDATE user_bans
               SET lifted_at = now()
             WHERE user_id = $1
               AND lifted_at IS NULL
               AND expires_at IS NOT NULL
               AND expires_at <= now()
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("close lapsed bans")?;

        let restored = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET status = 'approved', updated_at = now()
             WHERE id = $1
               AND NOT EXISTS (
                   SELECT 1 FROM user_bans
                    WHERE user_id = $1
                      AND lifted_at IS NULL
                      AND (expires_at IS NULL OR expires_at > now())
               )
            RETURNING id, username, email, password_hash, role, tier, status,
                      referral_code, referred_by, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("restore user")?;

        tx.commit().await.context("commit tx")?;
        Ok(restored.unwrap_or(user))
    }

    /// Tier change reported by the payment provider.
    pub async fn set_tier(db: &PgPool, user_id: Uuid, tier: Tier) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET tier = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, username, email, password_hash, role, tier, status,
                      referral_code, referred_by, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(tier)
        .fetch_optional(db)
        .await
        .context("set tier")?;
        Ok(user)
    }
}

impl UserBan {
    /// Ban history for a user, newest first.
    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<UserBan>> {
        let rows = sqlx::query_as::<_, UserBan>(
            r#"
            SELECT id, user_id, reason, banned_by, banned_at, expires_at, lifted_at, lifted_by
            FROM user_bans
            WHERE user_id = $1
            ORDER BY banned_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list bans")?;
        Ok(rows)
    }
}

/// Insert a user with the given role and status.
#[cfg(test)]
pub(crate) async fn seed_user(db: &PgPool, role: Role, status: UserStatus) -> User {
    let tag = Uuid::new_v4().simple().to_string();
    let user = User::create(
        db,
        NewUser {
            username: &format!("u_{}", &tag[..12]),
            email: &format!("{}@example.com", tag),
            password_hash: "x",
            role,
            referral_code: &tag[..8].to_uppercase(),
            referred_by: None,
        },
    )
    .await
    .unwrap();
    sqlx::query("UPDATE users SET status = $2 WHERE id = $1")
        .bind(user.id)
        .bind(status)
        .execute(db)
        .await
        .unwrap();
    User::find_by_id(db, user.id).await.unwrap().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn insert_ban(db: &PgPool, user_id: Uuid, by: Uuid, expires_in: Option<&str>) {
        sqlx::query(
            r#"
            INSERT INTO user_bans (user_id, reason, banned_by, expires_at)
            VALUES ($1, 'spam', $2, now() + $3::interval)
            "#,
        )
        .bind(user_id)
        .bind(by)
        .bind(expires_in)
        .execute(db)
        .await
        .unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn expired_ban_is_lifted_and_user_restored(db: PgPool) {
        let admin = seed_user(&db, Role::Admin, UserStatus::Approved).await;
        let user = seed_user(&db, Role::Student, UserStatus::Banned).await;
        insert_ban(&db, user.id, admin.id, Some("-1 hour")).await;

        let restored = User::restore_lapsed_ban(&db, user.id).await.unwrap();
        assert_eq!(restored.status, UserStatus::Approved);
        let bans = UserBan::list_for_user(&db, user.id).await.unwrap();
        assert!(bans.iter().all(|b| b.lifted_at.is_some()));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn permanent_ban_survives_restore(db: PgPool) {
        let admin = seed_user(&db, Role::Admin, UserStatus::Approved).await;
        let user = seed_user(&db, Role::Student, UserStatus::Banned).await;
        insert_ban(&db, user.id, admin.id, Some("-1 hour")).await;
        // NULL interval yields a NULL expiry, i.e. permanent
        insert_ban(&db, user.id, admin.id, None).await;

        let after = User::restore_lapsed_ban(&db, user.id).await.unwrap();
        assert_eq!(after.status, UserStatus::Banned);
        let bans = UserBan::list_for_user(&db, user.id).await.unwrap();
        let open: Vec<_> = bans.iter().filter(|b| b.lifted_at.is_none()).collect();
        assert_eq!(open.len(), 1);
        assert!(open[0].expires_at.is_none());
    }
}
