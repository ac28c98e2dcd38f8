//! Store seam for accounts and verification codes.
//!
//! Every method that writes more than one row runs as a single transaction
//! in the implementation: it commits as a whole or not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{NewUser, Role, User, VerificationCode};

/// Credential store plus verification code ledger.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), AuthError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Match `identifier` against email (case-insensitive) or username (exact).
    ///
    /// If the identifier is one user's email and another user's username, the
    /// email match wins.
    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, AuthError>;

    /// Case-insensitive email lookup.
    async fn email_exists(&self, email: &str) -> Result<bool, AuthError>;

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError>;

    /// Record a freshly issued code. `email` must already be normalized.
    async fn insert_code(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationCode, AuthError>;

    /// Newest unused code for `email`/`code` whose expiry is after `now`.
    async fn find_redeemable_code(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, AuthError>;

    /// Mark code `code_id` used and insert `user`, atomically.
    ///
    /// Fails with [`AuthError::InvalidOrExpiredCode`] if the code was consumed
    /// concurrently or has expired since it was looked up, and with
    /// [`AuthError::EmailTaken`] / [`AuthError::UsernameTaken`] on a uniqueness race.
    async fn register_with_code(&self, code_id: i64, user: NewUser) -> Result<User, AuthError>;

    /// Read-modify-write of a user's role, guarded by
    /// [`super::roles::check_role_change`].
    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<User, AuthError>;

    /// Insert `seed` unless a super admin already exists. Returns whether a
    /// row was inserted.
    async fn ensure_superadmin(&self, seed: NewUser) -> Result<bool, AuthError>;
}
