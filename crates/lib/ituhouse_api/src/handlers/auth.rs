//! Authentication request handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    EmailCodeRequest, EmailCodeResponse, LoginRequest, RegisterRequest, TokenResponse,
    UserResponse,
};
use crate::services::auth;

/// `POST /auth/request-code`: issue and email a verification code.
pub async fn request_code_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailCodeRequest>,
) -> AppResult<(StatusCode, Json<EmailCodeResponse>)> {
    let resp = auth::request_code(&state, &body.email).await?;
    Ok((StatusCode::ACCEPTED, Json(resp)))
}

/// `POST /auth/register`: create an account with a verification code.
pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = auth::register(&state, body).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// `POST /auth/login`: authenticate with email or username + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::login(&state, &body.identifier, &body.password).await?;
    Ok(Json(resp))
}

/// `GET /auth/me`: the user behind the bearer token.
pub async fn me_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<UserResponse> {
    Json(user.0.into())
}
