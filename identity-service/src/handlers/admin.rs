//! Administrator identity-management handlers.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use platform_core::error::AppError;

use crate::dtos::{ApproveIdentityRequest, ErrorResponse};
use crate::middleware::AuthUser;
use crate::models::{ClientMeta, IdentityResponse, Permission};
use crate::utils::ValidatedJson;
use crate::AppState;

/// Activate a pending identity with a base role
#[utoipa::path(
    post,
    path = "/admin/identities/{identity_id}/approve",
    params(("identity_id" = String, Path, description = "Identity to activate")),
    request_body = ApproveIdentityRequest,
    responses(
        (status = 200, description = "Identity activated", body = IdentityResponse),
        (status = 403, description = "Missing identity.manage permission", body = ErrorResponse),
        (status = 404, description = "Unknown identity", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn approve_identity(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    headers: HeaderMap,
    Path(identity_id): Path<String>,
    ValidatedJson(req): ValidatedJson<ApproveIdentityRequest>,
) -> Result<Json<IdentityResponse>, AppError> {
    context.require(Permission::IdentityManage)?;
    let identity = state
        .auth
        .approve_identity(
            &context.actor,
            &identity_id,
            req.role,
            &ClientMeta::from_headers(&headers),
        )
        .await?;
    Ok(Json(identity.sanitized()))
}

/// Suspend an identity and revoke all of its sessions
#[utoipa::path(
    post,
    path = "/admin/identities/{identity_id}/suspend",
    params(("identity_id" = String, Path, description = "Identity to suspend")),
    responses(
        (status = 200, description = "Identity suspended", body = IdentityResponse),
        (status = 403, description = "Missing identity.manage permission", body = ErrorResponse),
        (status = 404, description = "Unknown identity", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn suspend_identity(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    headers: HeaderMap,
    Path(identity_id): Path<String>,
) -> Result<Json<IdentityResponse>, AppError> {
    context.require(Permission::IdentityManage)?;
    let identity = state
        .auth
        .suspend_identity(
            &context.actor,
            &identity_id,
            &ClientMeta::from_headers(&headers),
        )
        .await?;
    Ok(Json(identity.sanitized()))
}
