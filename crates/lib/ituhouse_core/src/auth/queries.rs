//! PostgreSQL implementation of [`AuthStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::store::AuthStore;
use super::{AuthError, roles};
use crate::models::auth::{NewUser, Role, User, VerificationCode};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, preferred_locale, \
     preferred_theme, email_verified, is_active, created_at, updated_at";

const CODE_COLUMNS: &str = "id, email, code, expires_at, used, created_at";

/// Serializes super admin seeding across concurrently starting instances.
const SUPERADMIN_SEED_LOCK: i64 = 0x6974_7568_6f75_7365;

/// Account and verification code store backed by PostgreSQL.
#[derive(Clone, Debug)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Translate unique violations on `users` into domain errors.
fn map_user_insert_error(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        match db.constraint() {
            Some("uq_users_email") => return AuthError::EmailTaken,
            Some("uq_users_username") => return AuthError::UsernameTaken,
            _ => {}
        }
    }
    AuthError::Db(e)
}

async fn insert_user<'e, E>(executor: E, user: &NewUser) -> Result<User, AuthError>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO users (id, username, email, password_hash, role, preferred_locale, \
         preferred_theme, email_verified) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {USER_COLUMNS}"
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(&user.preferred_locale)
        .bind(&user.preferred_theme)
        .bind(user.email_verified)
        .fetch_one(executor)
        .await
        .map_err(map_user_insert_error)
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn ping(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, AuthError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE lower(email) = lower($1) OR username = $1 \
             ORDER BY (lower(email) = lower($1)) DESC \
             LIMIT 1"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1))",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert_code(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationCode, AuthError> {
        let sql = format!(
            "INSERT INTO email_verification_codes (email, code, expires_at) \
             VALUES ($1, $2, $3) RETURNING {CODE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, VerificationCode>(&sql)
            .bind(email)
            .bind(code)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_redeemable_code(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, AuthError> {
        let sql = format!(
            "SELECT {CODE_COLUMNS} FROM email_verification_codes \
             WHERE lower(email) = $1 AND code = $2 AND used = FALSE AND expires_at > $3 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        let record = sqlx::query_as::<_, VerificationCode>(&sql)
            .bind(email)
            .bind(code)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn register_with_code(&self, code_id: i64, user: NewUser) -> Result<User, AuthError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query_scalar::<_, i64>(
            "UPDATE email_verification_codes SET used = TRUE \
             WHERE id = $1 AND used = FALSE AND expires_at > now() RETURNING id",
        )
        .bind(code_id)
        .fetch_optional(&mut *tx)
        .await?;
        if claimed.is_none() {
            // Dropping `tx` rolls back.
            return Err(AuthError::InvalidOrExpiredCode);
        }

        let created = insert_user(&mut *tx, &user).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<User, AuthError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        roles::check_role_change(current, role)?;

        let sql = format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(role)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn ensure_superadmin(&self, seed: NewUser) -> Result<bool, AuthError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SUPERADMIN_SEED_LOCK)
            .execute(&mut *tx)
            .await?;
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE role = 'super_admin')",
        )
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Ok(false);
        }

        insert_user(&mut *tx, &seed).await?;
        tx.commit().await?;
        Ok(true)
    }
}
