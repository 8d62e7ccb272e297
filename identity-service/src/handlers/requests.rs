//! Capability-request handlers.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use platform_core::error::AppError;

use crate::dtos::{DecideRequestDto, ErrorResponse, ListRequestsParams, SubmitRequestDto};
use crate::middleware::AuthUser;
use crate::models::{CapabilityRequestResponse, ClientMeta, Permission};
use crate::utils::ValidatedJson;
use crate::AppState;

/// Submit a role or capability request
#[utoipa::path(
    post,
    path = "/requests",
    request_body = SubmitRequestDto,
    responses(
        (status = 201, description = "Request submitted", body = CapabilityRequestResponse),
        (status = 400, description = "Neither role nor capabilities requested", body = ErrorResponse)
    ),
    tag = "Requests",
    security(("bearer_auth" = []))
)]
pub async fn submit_request(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<SubmitRequestDto>,
) -> Result<(StatusCode, Json<CapabilityRequestResponse>), AppError> {
    let meta = ClientMeta::from_headers(&headers);
    let request = match (req.requested_role, req.requested_capabilities) {
        (Some(role), None) => {
            state
                .requests
                .submit_role_request(&context.actor, role, req.justification, &meta)
                .await?
        }
        (None, Some(capabilities)) if !capabilities.is_empty() => {
            state
                .requests
                .submit_capability_request(&context.actor, capabilities, req.justification, &meta)
                .await?
        }
        _ => {
            return Err(AppError::BadRequest(
                "request exactly one of a base role or a non-empty capability set".to_string(),
            ))
        }
    };
    Ok((StatusCode::CREATED, Json(request.sanitized())))
}

/// List capability requests (own; administrators may filter any identity)
#[utoipa::path(
    get,
    path = "/requests",
    params(ListRequestsParams),
    responses(
        (status = 200, description = "Matching requests, newest first", body = [CapabilityRequestResponse])
    ),
    tag = "Requests",
    security(("bearer_auth" = []))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    Query(params): Query<ListRequestsParams>,
) -> Result<Json<Vec<CapabilityRequestResponse>>, AppError> {
    let identity_filter = if context.actor.is_admin() {
        params.identity_id
    } else {
        // Non-administrators only ever see their own requests.
        Some(context.actor.id.clone())
    };
    let requests = state
        .requests
        .list(identity_filter.as_deref(), params.status)
        .await?;
    Ok(Json(requests.iter().map(|r| r.sanitized()).collect()))
}

/// Approve a pending request, optionally narrowing the granted set
#[utoipa::path(
    post,
    path = "/requests/{request_id}/approve",
    params(("request_id" = String, Path, description = "Request to approve")),
    request_body = DecideRequestDto,
    responses(
        (status = 200, description = "Request approved", body = CapabilityRequestResponse),
        (status = 403, description = "Not an administrator or own request", body = ErrorResponse),
        (status = 409, description = "Already decided", body = ErrorResponse)
    ),
    tag = "Requests",
    security(("bearer_auth" = []))
)]
pub async fn approve_request(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    ValidatedJson(req): ValidatedJson<DecideRequestDto>,
) -> Result<Json<CapabilityRequestResponse>, AppError> {
    context.require(Permission::IdentityManage)?;
    let decided = state
        .requests
        .approve(
            &context.actor,
            &request_id,
            req.granted_capabilities,
            req.notes,
            &ClientMeta::from_headers(&headers),
        )
        .await?;
    Ok(Json(decided.sanitized()))
}

/// Reject a pending request
#[utoipa::path(
    post,
    path = "/requests/{request_id}/reject",
    params(("request_id" = String, Path, description = "Request to reject")),
    request_body = DecideRequestDto,
    responses(
        (status = 200, description = "Request rejected", body = CapabilityRequestResponse),
        (status = 403, description = "Not an administrator or own request", body = ErrorResponse),
        (status = 409, description = "Already decided", body = ErrorResponse)
    ),
    tag = "Requests",
    security(("bearer_auth" = []))
)]
pub async fn reject_request(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    ValidatedJson(req): ValidatedJson<DecideRequestDto>,
) -> Result<Json<CapabilityRequestResponse>, AppError> {
    context.require(Permission::IdentityManage)?;
    let decided = state
        .requests
        .reject(
            &context.actor,
            &request_id,
            req.notes,
            &ClientMeta::from_headers(&headers),
        )
        .await?;
    Ok(Json(decided.sanitized()))
}

/// Fetch one request (owner or administrator)
#[utoipa::path(
    get,
    path = "/requests/{request_id}",
    params(("request_id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "The request", body = CapabilityRequestResponse),
        (status = 404, description = "Unknown request", body = ErrorResponse)
    ),
    tag = "Requests",
    security(("bearer_auth" = []))
)]
pub async fn get_request(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    Path(request_id): Path<String>,
) -> Result<Json<CapabilityRequestResponse>, AppError> {
    let request = state.requests.get(&request_id).await?;
    context.require_self_or_admin(&request.identity_id)?;
    Ok(Json(request.sanitized()))
}
