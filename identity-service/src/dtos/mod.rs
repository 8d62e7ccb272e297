//! Request/response payloads for the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::{
    ApiKeyResponse, BaseRole, Capability, IdentityResponse, Permission,
};

/// Wire shape of every error body. `failure` names the machine-readable
/// authentication failure on 401s; `details` carries validation or retry
/// context where present.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// ==================== Auth ====================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Authorization code from the external identity provider.
    #[validate(length(min = 1, max = 512))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LogoutRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IntrospectRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IntrospectResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<BaseRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<Permission>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    #[serde(flatten)]
    pub identity: IdentityResponse,
    pub permissions: Vec<Permission>,
}

// ==================== API keys ====================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateKeyRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
}

/// The only response that ever carries the plaintext key.
#[derive(Debug, Serialize, ToSchema)]
pub struct KeyCreatedResponse {
    #[serde(flatten)]
    pub key: ApiKeyResponse,
    pub plaintext: String,
}

// ==================== Capability requests ====================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitRequestDto {
    /// Present for a base-role request.
    pub requested_role: Option<BaseRole>,
    /// Present for a capability request.
    pub requested_capabilities: Option<Vec<Capability>>,
    #[validate(length(min = 10, max = 2000))]
    pub justification: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DecideRequestDto {
    /// Narrow an approval to a subset of the requested capabilities.
    pub granted_capabilities: Option<Vec<Capability>>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListRequestsParams {
    /// Admin-only filter: list another identity's requests.
    pub identity_id: Option<String>,
    pub status: Option<crate::models::RequestStatus>,
}

// ==================== Admin ====================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ApproveIdentityRequest {
    pub role: BaseRole,
}

// ==================== Audit ====================

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    pub actor_id: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub component: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}
