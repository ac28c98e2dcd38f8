//! # ituhouse_api
//!
//! HTTP API library for ituhouse.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, patch, post};
use ituhouse_core::auth::AuthStore;
use ituhouse_core::auth::jwt::TokenCodec;
use ituhouse_core::mail::Mailer;
use ituhouse_core::models::auth::Role;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, health};
use crate::middleware::auth::{RoleGate, require_auth, require_roles};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Accounts and verification codes.
    pub store: Arc<dyn AuthStore>,
    /// Verification email delivery.
    pub mailer: Mailer,
    /// Access token signer/verifier.
    pub codec: TokenCodec,
    /// API configuration.
    pub config: ApiConfig,
    /// Digest checked when a login names no account, built on first use.
    pub(crate) dummy_hash: Arc<OnceLock<String>>,
}

impl AppState {
    pub fn new(store: Arc<dyn AuthStore>, mailer: Mailer, config: ApiConfig) -> Self {
        let codec = TokenCodec::new(config.jwt_secret.as_bytes());
        Self {
            store,
            mailer,
            codec,
            config,
            dummy_hash: Arc::default(),
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `ituhouse_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    ituhouse_core::migrate::migrate(pool).await
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allow_origins);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/auth/request-code", post(auth::request_code_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler));

    // Any authenticated, active user
    let session = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Super admin only; the role gate runs after `require_auth`
    let superadmin = Router::new()
        .route(
            "/admin/users/{user_id}/role",
            patch(admin::update_role_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            RoleGate::new(&[Role::SuperAdmin]),
            require_roles,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(session)
        .merge(superadmin)
        .layer(cors)
        .with_state(state)
}
