//! Authentication domain models.
//!
//! These are internal domain models. The API crate maps `User` into its own
//! response shape and never serializes `password_hash`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role, ordered by privilege.
///
/// `SuperAdmin` satisfies every role requirement; see
/// [`crate::auth::roles::authorize`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum Role {
    Visitor,
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Wire and database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Visitor => "visitor",
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Always stored lower-cased and trimmed.
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub preferred_locale: String,
    pub preferred_theme: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a user. The store assigns `id` and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub preferred_locale: String,
    pub preferred_theme: String,
    pub email_verified: bool,
}

/// One-time registration code sent by email.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VerificationCode {
    pub id: i64,
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

/// JWT claims embedded in access tokens.
///
/// `role` is a snapshot taken at issuance. A later role change does not
/// affect tokens already handed out; they carry the old role until `exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: user ID in hyphenated string form.
    pub sub: String,
    /// Expiry (unix seconds).
    pub exp: i64,
    pub role: Role,
}
