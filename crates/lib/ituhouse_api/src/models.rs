//! Request and response bodies.
//!
//! JSON field names are snake_case. Request types that carry passwords do
//! not implement `Debug`.

use chrono::{DateTime, Utc};
use ituhouse_core::models::auth::{Role, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error body returned for every failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Whether the store answered a ping.
    pub store: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailCodeRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailCodeResponse {
    pub message: String,
    /// Echoed outside production only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub verification_code: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub preferred_locale: Option<String>,
    #[serde(default)]
    pub preferred_theme: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    /// Email (case-insensitive) or username (exact).
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: Role,
}

/// Public view of a user. Never includes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub preferred_locale: String,
    pub preferred_theme: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            preferred_locale: user.preferred_locale,
            preferred_theme: user.preferred_theme,
            email_verified: user.email_verified,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
