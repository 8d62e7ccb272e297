//! API key management handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use platform_core::error::AppError;

use crate::dtos::{CreateKeyRequest, ErrorResponse, KeyCreatedResponse};
use crate::middleware::AuthUser;
use crate::models::{
    ApiKeyResponse, AuditEntry, AuthMethod, ClientMeta, Permission,
};
use crate::services::audit::COMPONENT_IDENTITY;
use crate::utils::ValidatedJson;
use crate::AppState;

/// Issue a new API key; the plaintext appears in this response only
#[utoipa::path(
    post,
    path = "/keys",
    request_body = CreateKeyRequest,
    responses(
        (status = 201, description = "Key issued", body = KeyCreatedResponse),
        (status = 403, description = "Missing api_key.manage permission", body = ErrorResponse)
    ),
    tag = "Keys",
    security(("bearer_auth" = []))
)]
pub async fn create_key(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<CreateKeyRequest>,
) -> Result<(StatusCode, Json<KeyCreatedResponse>), AppError> {
    context.require(Permission::ApiKeyManage)?;
    let identity = state.auth.get_identity(&context.actor.id).await?;
    let (key, plaintext) = state.api_keys.issue(&identity, &req.name).await?;

    state.audit.record(
        AuditEntry::new(
            context.actor.id.clone(),
            "api_key.create",
            COMPONENT_IDENTITY,
            context.auth_method,
        )
        .with_resource("api_key", key.id.clone())
        .with_client(&ClientMeta::from_headers(&headers)),
    );
    Ok((
        StatusCode::CREATED,
        Json(KeyCreatedResponse {
            key: key.sanitized(),
            plaintext,
        }),
    ))
}

/// List the caller's API keys
#[utoipa::path(
    get,
    path = "/keys",
    responses(
        (status = 200, description = "Keys, newest first", body = [ApiKeyResponse])
    ),
    tag = "Keys",
    security(("bearer_auth" = []))
)]
pub async fn list_keys(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    context.require(Permission::ApiKeyManage)?;
    let keys = state.api_keys.list(&context.actor.id).await?;
    Ok(Json(keys.iter().map(|k| k.sanitized()).collect()))
}

/// Revoke an API key
#[utoipa::path(
    delete,
    path = "/keys/{key_id}",
    params(("key_id" = String, Path, description = "Key to revoke")),
    responses(
        (status = 200, description = "Key revoked", body = ApiKeyResponse),
        (status = 403, description = "Not the key owner", body = ErrorResponse),
        (status = 409, description = "Key is not active", body = ErrorResponse)
    ),
    tag = "Keys",
    security(("bearer_auth" = []))
)]
pub async fn revoke_key(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    headers: HeaderMap,
    Path(key_id): Path<String>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    context.require(Permission::ApiKeyManage)?;
    let key = state.api_keys.revoke(&context.actor, &key_id).await?;

    state.audit.record(
        AuditEntry::new(
            context.actor.id.clone(),
            "api_key.revoke",
            COMPONENT_IDENTITY,
            context.auth_method,
        )
        .with_resource("api_key", key.id.clone())
        .with_client(&ClientMeta::from_headers(&headers)),
    );
    Ok(Json(key.sanitized()))
}

/// Revoke a key and issue a replacement with the same name and scopes
#[utoipa::path(
    post,
    path = "/keys/{key_id}/regenerate",
    params(("key_id" = String, Path, description = "Key to regenerate")),
    responses(
        (status = 201, description = "Replacement issued", body = KeyCreatedResponse),
        (status = 403, description = "Not the key owner", body = ErrorResponse)
    ),
    tag = "Keys",
    security(("bearer_auth" = []))
)]
pub async fn regenerate_key(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    headers: HeaderMap,
    Path(key_id): Path<String>,
) -> Result<(StatusCode, Json<KeyCreatedResponse>), AppError> {
    context.require(Permission::ApiKeyManage)?;
    let (key, plaintext) = state.api_keys.regenerate(&context.actor, &key_id).await?;

    state.audit.record(
        AuditEntry::new(
            context.actor.id.clone(),
            "api_key.regenerate",
            COMPONENT_IDENTITY,
            context.auth_method,
        )
        .with_resource("api_key", key.id.clone())
        .with_client(&ClientMeta::from_headers(&headers)),
    );
    Ok((
        StatusCode::CREATED,
        Json(KeyCreatedResponse {
            key: key.sanitized(),
            plaintext,
        }),
    ))
}
