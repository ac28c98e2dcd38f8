//! Admin request handlers.

use axum::extract::State;
use axum::{Extension, Json};
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{RoleUpdateRequest, UserResponse};
use crate::services::auth;

/// `PATCH /admin/users/{user_id}/role`: change a user's role. Super admin only.
pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthenticatedUser>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<RoleUpdateRequest>,
) -> AppResult<Json<UserResponse>> {
    info!(actor = %actor.0.id, target = %user_id, role = %body.role, "role update requested");
    let user = auth::update_role(&state, user_id, body.role).await?;
    Ok(Json(user.into()))
}
