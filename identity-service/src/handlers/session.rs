//! Session handlers: login, refresh, logout, introspection.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::json;

use platform_core::error::AppError;

use crate::dtos::{
    ErrorResponse, IntrospectRequest, IntrospectResponse, LoginRequest, LogoutRequest,
    RefreshRequest,
};
use crate::models::ClientMeta;
use crate::services::jwt::TokenResponse;
use crate::services::permissions;
use crate::utils::ValidatedJson;
use crate::AppState;

/// Exchange a provider authorization code for a token pair
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenResponse),
        (status = 401, description = "Provider rejected the code", body = ErrorResponse),
        (status = 403, description = "Account pending approval or suspended", body = ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let meta = ClientMeta::from_headers(&headers);
    let pair = state.auth.login(&req.code, &meta).await?;
    Ok(Json(pair))
}

/// Rotate a refresh token for a fresh pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated token pair", body = TokenResponse),
        (status = 401, description = "Invalid, reused, or revoked refresh token", body = ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let meta = ClientMeta::from_headers(&headers);
    let pair = state.tokens.refresh(&req.refresh_token, &meta).await?;
    Ok(Json(pair))
}

/// Revoke the session behind a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Session revoked"),
        (status = 401, description = "Malformed refresh token", body = ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn logout(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LogoutRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    state.tokens.revoke(&req.refresh_token).await?;
    Ok((StatusCode::OK, Json(json!({ "message": "logged out" }))))
}

/// Introspect an access token on behalf of a collaborator service
#[utoipa::path(
    post,
    path = "/auth/introspect",
    request_body = IntrospectRequest,
    responses(
        (status = 200, description = "Introspection result (inactive tokens report active=false)", body = IntrospectResponse)
    ),
    tag = "Session"
)]
pub async fn introspect(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<IntrospectRequest>,
) -> Result<Json<IntrospectResponse>, AppError> {
    // A failed verification is a negative answer, not an error.
    let response = match state.tokens.verify_access(&req.token) {
        Ok(claims) => {
            let actor = claims.actor();
            IntrospectResponse {
                active: true,
                identity_id: Some(claims.sub),
                email: Some(claims.email),
                role: Some(claims.role),
                permissions: Some(
                    permissions::effective_permissions(&actor)
                        .into_iter()
                        .collect(),
                ),
                expires_at: Some(claims.exp),
            }
        }
        Err(AppError::AuthenticationFailed(_)) => IntrospectResponse {
            active: false,
            identity_id: None,
            email: None,
            role: None,
            permissions: None,
            expires_at: None,
        },
        Err(other) => return Err(other),
    };
    Ok(Json(response))
}
