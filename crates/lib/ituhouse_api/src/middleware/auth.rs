//! Authentication middleware: bearer token resolution and the role gate.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use ituhouse_core::auth::{AuthError, roles};
use ituhouse_core::models::auth::{Role, User};

use crate::AppState;
use crate::error::AppError;
use crate::services::auth::resolve_current_user;

/// The resolved, active user, stored in request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Axum middleware: resolves the bearer token to an active user and injects
/// [`AuthenticatedUser`] into request extensions.
///
/// Missing header, wrong scheme, bad token and unknown or inactive user all
/// produce the same 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or(AuthError::Unauthenticated)?
        .to_owned();
    let user = resolve_current_user(&state, &token).await?;
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Roles allowed through [`require_roles`]. Super admins always pass.
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: Arc<[Role]>,
}

impl RoleGate {
    pub fn new(allowed: &[Role]) -> Self {
        Self {
            allowed: allowed.into(),
        }
    }
}

/// Axum middleware: checks the authenticated user's role against a [`RoleGate`].
///
/// Must be layered inside [`require_auth`]. Answers 403 when the identity is
/// valid but the role is not allowed.
pub async fn require_roles(
    State(gate): State<RoleGate>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let role = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.0.role)
        .ok_or(AuthError::Unauthenticated)?;
    roles::authorize(role, &gate.allowed)?;
    Ok(next.run(request).await)
}
