//! Audit entry model - append-only record of authorization-gated actions.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// How the actor authenticated for the audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    AccessToken,
    ApiKey,
    System,
}

/// Network/client metadata attached to audit entries.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string());
        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        Self {
            ip_address,
            user_agent,
        }
    }
}

/// Append-only audit entry. The only mutation the store supports is
/// insertion; there is no update or delete path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEntry {
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: String,

    pub actor_id: String,

    pub action: String,

    pub resource_type: Option<String>,

    pub resource_id: Option<String>,

    /// Tag of the collaborator surface that recorded the entry.
    pub component: String,

    /// Free-form detail map.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub detail: serde_json::Value,

    pub ip_address: Option<String>,

    pub user_agent: Option<String>,

    pub auth_method: AuthMethod,

    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_id: impl Into<String>,
        action: impl Into<String>,
        component: impl Into<String>,
        auth_method: AuthMethod,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor_id: actor_id.into(),
            action: action.into(),
            resource_type: None,
            resource_id: None,
            component: component.into(),
            detail: serde_json::Value::Null,
            ip_address: None,
            user_agent: None,
            auth_method,
            timestamp: Utc::now(),
        }
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_client(mut self, meta: &ClientMeta) -> Self {
        self.ip_address = meta.ip_address.clone();
        self.user_agent = meta.user_agent.clone();
        self
    }
}

/// Filters for the audit read path. Results are ordered by timestamp
/// descending.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
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
