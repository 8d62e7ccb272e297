//! Audit read handler.

use axum::{
    extract::{Query, State},
    Json,
};

use platform_core::error::AppError;

use crate::dtos::{AuditQueryParams, ErrorResponse};
use crate::middleware::AuthUser;
use crate::models::{AuditEntry, AuditQuery, Permission};
use crate::AppState;

/// Query audit entries, newest first
#[utoipa::path(
    get,
    path = "/audit",
    params(AuditQueryParams),
    responses(
        (status = 200, description = "Matching entries", body = [AuditEntry]),
        (status = 403, description = "Missing audit.view permission", body = ErrorResponse)
    ),
    tag = "Audit",
    security(("bearer_auth" = []))
)]
pub async fn query_audit(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    context.require(Permission::AuditView)?;
    let entries = state
        .audit
        .query(AuditQuery {
            actor_id: params.actor_id,
            action: params.action,
            resource_type: params.resource_type,
            resource_id: params.resource_id,
            component: params.component,
            from: params.from,
            to: params.to,
            limit: params.limit,
            offset: params.offset,
        })
        .await?;
    Ok(Json(entries))
}
