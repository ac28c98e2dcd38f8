//! Authentication service: registration by email code, login, session
//! resolution and role management, delegating to `ituhouse_core::auth`.

use chrono::Utc;
use ituhouse_core::auth::AuthError;
use ituhouse_core::auth::password::{hash_password, verify_password};
use ituhouse_core::auth::verification::{
    code_ttl, generate_code, normalize_email, validate_code_format, validate_email,
};
use ituhouse_core::mail::verification_email;
use ituhouse_core::models::auth::{NewUser, Role, User};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{EmailCodeResponse, RegisterRequest, TokenResponse};

const USERNAME_LEN: (usize, usize) = (3, 50);
const PASSWORD_LEN: (usize, usize) = (8, 128);
const LOCALE_MAX_LEN: usize = 32;
const THEME_MAX_LEN: usize = 16;
const DUMMY_PASSWORD: &str = "ituhouse-no-such-account";

// ---------------------------------------------------------------------------
// Password hashing (bcrypt is CPU-bound; keep it off the async workers)
// ---------------------------------------------------------------------------

async fn hash_blocking(password: String, cost: u32) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hash task: {e}")))?
        .map_err(AppError::from)
}

async fn verify_blocking(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verify task: {e}")))
}

/// One bcrypt verification against a fixed digest, for logins naming no account.
async fn verify_dummy(state: &AppState, password: String) -> AppResult<()> {
    let cell = state.dummy_hash.clone();
    let cost = state.config.bcrypt_cost;
    tokio::task::spawn_blocking(move || {
        let digest = cell.get_or_init(|| hash_password(DUMMY_PASSWORD, cost).unwrap_or_default());
        verify_password(&password, digest)
    })
    .await
    .map_err(|e| AppError::Internal(format!("verify task: {e}")))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

fn check_len(field: &str, value: &str, (min, max): (usize, usize)) -> AppResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{field}: must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

fn optional_preference(
    field: &str,
    value: Option<String>,
    max: usize,
    default: &str,
) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default.to_string()),
        Some(v) if v.chars().count() <= max => Ok(v),
        Some(_) => Err(AppError::Validation(format!(
            "{field}: must be at most {max} characters"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Public auth operations
// ---------------------------------------------------------------------------

/// Issue a verification code for `email` and try to deliver it.
///
/// The code row is committed before delivery is attempted and is kept even if
/// delivery fails. Delivery failure is fatal only in production; elsewhere the
/// code is echoed back in the response.
pub async fn request_code(state: &AppState, email: &str) -> AppResult<EmailCodeResponse> {
    let email = normalize_email(email);
    validate_email(&email)?;

    let code = generate_code();
    let expires_at = Utc::now() + code_ttl();
    state.store.insert_code(&email, &code, expires_at).await?;

    let message = verification_email(&email, &code, &state.config.app_name);
    let delivered = state.mailer.deliver(&message).await;
    let production = state.config.is_production();
    if !delivered {
        if production {
            return Err(AuthError::Delivery("Failed to send verification email".into()).into());
        }
        warn!(email = %email, "verification email not delivered; continuing outside production");
    }

    debug!(email = %email, delivered, "verification code issued");
    Ok(EmailCodeResponse {
        message: "Verification code generated".into(),
        code: (!production).then_some(code),
    })
}

/// Register an account by consuming a verification code.
///
/// The code check runs first, then email and username uniqueness; the user
/// insert and marking the code used commit together.
pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<User> {
    let email = normalize_email(&req.email);
    validate_email(&email)?;
    validate_code_format(&req.verification_code)?;
    check_len("username", &req.username, USERNAME_LEN)?;
    check_len("password", &req.password, PASSWORD_LEN)?;
    let preferred_locale = optional_preference(
        "preferred_locale",
        req.preferred_locale,
        LOCALE_MAX_LEN,
        &state.config.default_locale,
    )?;
    let preferred_theme = optional_preference(
        "preferred_theme",
        req.preferred_theme,
        THEME_MAX_LEN,
        &state.config.default_theme,
    )?;

    let code = state
        .store
        .find_redeemable_code(&email, &req.verification_code, Utc::now())
        .await?
        .ok_or(AuthError::InvalidOrExpiredCode)?;

    if state.store.email_exists(&email).await? {
        return Err(AuthError::EmailTaken.into());
    }
    if state.store.username_exists(&req.username).await? {
        return Err(AuthError::UsernameTaken.into());
    }

    let password_hash = hash_blocking(req.password, state.config.bcrypt_cost).await?;
    let user = state
        .store
        .register_with_code(
            code.id,
            NewUser {
                username: req.username,
                email,
                password_hash,
                role: Role::User,
                preferred_locale,
                preferred_theme,
                email_verified: true,
            },
        )
        .await?;

    info!(user_id = %user.id, username = %user.username, "registered user");
    Ok(user)
}

/// Authenticate with email or username plus password.
///
/// Unknown identifier and wrong password yield the same error. An inactive
/// account is reported separately, and only after the password matched.
pub async fn login(state: &AppState, identifier: &str, password: &str) -> AppResult<TokenResponse> {
    let identifier = identifier.trim();
    let Some(user) = state.store.find_user_by_identifier(identifier).await? else {
        verify_dummy(state, password.to_string()).await?;
        return Err(AuthError::InvalidCredentials.into());
    };

    if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
        return Err(AuthError::InvalidCredentials.into());
    }
    if !user.is_active {
        return Err(AuthError::AccountInactive.into());
    }

    let ttl = state.config.access_token_ttl();
    let access_token = state.codec.issue(user.id, user.role, ttl)?;
    debug!(user_id = %user.id, role = %user.role, "issued access token");

    Ok(TokenResponse {
        access_token,
        token_type: "bearer".into(),
        expires_in: ttl.num_seconds(),
    })
}

/// Resolve the active user behind a bearer token.
///
/// Every token or lookup failure collapses to [`AuthError::Unauthenticated`];
/// only store errors propagate as themselves.
pub async fn resolve_current_user(state: &AppState, token: &str) -> Result<User, AuthError> {
    let claims = state.codec.verify(token).map_err(|e| {
        debug!(error = %e, "rejected bearer token");
        AuthError::Unauthenticated
    })?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::Unauthenticated)?;
    match state.store.find_user_by_id(user_id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(AuthError::Unauthenticated),
    }
}

/// Change a user's role. A super admin can never be demoted.
///
/// Tokens already issued to the target keep their old role claim until they
/// expire.
pub async fn update_role(state: &AppState, user_id: Uuid, role: Role) -> AppResult<User> {
    let user = state.store.update_role(user_id, role).await?;
    info!(user_id = %user.id, role = %user.role, "updated user role");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use ituhouse_core::auth::memory::MemoryAuthStore;
    use ituhouse_core::mail::Mailer;

    use super::*;
    use crate::config::ApiConfig;

    fn state() -> AppState {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("JWT_SECRET_KEY", "unit-secret"),
            ("BCRYPT_COST", "4"),
            ("SUPERADMIN_EMAIL", "root@example.com"),
            ("SUPERADMIN_PASSWORD", "root-password"),
        ]);
        let config = ApiConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        AppState::new(Arc::new(MemoryAuthStore::new()), Mailer::default(), config)
    }

    #[tokio::test]
    async fn unknown_identifier_still_runs_bcrypt() {
        let state = state();
        assert!(state.dummy_hash.get().is_none());

        let result = login(&state, "nobody@example.com", "password123").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
        let digest = state.dummy_hash.get().expect("dummy digest built");
        assert!(digest.starts_with("$2"));

        // The placeholder password never authenticates anyone.
        let result = login(&state, "nobody@example.com", DUMMY_PASSWORD).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn length_limits_count_characters() {
        assert!(check_len("username", "小兔书", USERNAME_LEN).is_ok());
        assert!(check_len("username", "ab", USERNAME_LEN).is_err());
        assert!(check_len("password", &"x".repeat(129), PASSWORD_LEN).is_err());
    }

    #[test]
    fn blank_preference_falls_back_to_default() {
        let value = optional_preference("preferred_theme", Some("  ".into()), THEME_MAX_LEN, "system");
        assert_eq!(value.unwrap(), "system");
        let value = optional_preference("preferred_theme", Some("dark".into()), THEME_MAX_LEN, "system");
        assert_eq!(value.unwrap(), "dark");
        assert!(optional_preference("preferred_theme", Some("x".repeat(17)), THEME_MAX_LEN, "system").is_err());
    }
}
