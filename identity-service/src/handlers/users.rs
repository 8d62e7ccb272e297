//! Identity self-service handlers.

use axum::{extract::State, Json};

use platform_core::error::AppError;

use crate::dtos::{ErrorResponse, MeResponse};
use crate::middleware::AuthUser;
use crate::AppState;

/// Current identity with its effective permissions
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Caller's identity record", body = MeResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let identity = state.auth.get_identity(&context.actor.id).await?;
    Ok(Json(MeResponse {
        identity: identity.sanitized(),
        permissions: context.permissions.into_iter().collect(),
    }))
}
