//! Authentication and authorization logic.
//!
//! Provides password hashing, JWT management, verification codes, the role
//! gate, and the store seam shared by the HTTP layer and the bootstrap path.

pub mod jwt;
pub mod memory;
pub mod password;
pub mod queries;
pub mod roles;
pub mod store;
pub mod verification;

use thiserror::Error;

pub use store::AuthStore;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No such user or wrong password. The two cases are never told apart.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User inactive")]
    AccountInactive,

    /// No usable identity. Callers must not learn why.
    #[error("Could not validate credentials")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid or expired code")]
    InvalidOrExpiredCode,

    #[error("email already registered")]
    EmailTaken,

    #[error("username already registered")]
    UsernameTaken,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot demote super admin")]
    SuperadminDemotion,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email delivery failed: {0}")]
    Delivery(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
