//! Capability request model - identity-initiated role/capability changes
//! terminated by an administrator decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{BaseRole, Capability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    BaseRole,
    Capability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A request is immutable once decided; further changes require a new
/// request record. Partial approval is recorded as the granted subset on
/// the same record, not as a second request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRequest {
    #[serde(rename = "_id")]
    pub id: String,

    pub identity_id: String,

    pub kind: RequestKind,

    pub requested_role: Option<BaseRole>,

    #[serde(default)]
    pub requested_capabilities: Vec<Capability>,

    pub justification: String,

    pub status: RequestStatus,

    /// On approval, the subset actually granted (defaults to the full
    /// requested set when the administrator grants everything).
    pub granted_capabilities: Option<Vec<Capability>>,

    pub decided_by: Option<String>,

    pub decided_at: Option<DateTime<Utc>>,

    pub decision_notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl CapabilityRequest {
    pub fn new_role_request(identity_id: String, role: BaseRole, justification: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identity_id,
            kind: RequestKind::BaseRole,
            requested_role: Some(role),
            requested_capabilities: Vec::new(),
            justification,
            status: RequestStatus::Pending,
            granted_capabilities: None,
            decided_by: None,
            decided_at: None,
            decision_notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn new_capability_request(
        identity_id: String,
        capabilities: Vec<Capability>,
        justification: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identity_id,
            kind: RequestKind::Capability,
            requested_role: None,
            requested_capabilities: capabilities,
            justification,
            status: RequestStatus::Pending,
            granted_capabilities: None,
            decided_by: None,
            decided_at: None,
            decision_notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_decided(&self) -> bool {
        self.status != RequestStatus::Pending
    }

    /// Response view with a plain `id` field.
    pub fn sanitized(&self) -> CapabilityRequestResponse {
        CapabilityRequestResponse {
            id: self.id.clone(),
            identity_id: self.identity_id.clone(),
            kind: self.kind,
            requested_role: self.requested_role,
            requested_capabilities: self.requested_capabilities.clone(),
            justification: self.justification.clone(),
            status: self.status,
            granted_capabilities: self.granted_capabilities.clone(),
            decided_by: self.decided_by.clone(),
            decided_at: self.decided_at,
            decision_notes: self.decision_notes.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CapabilityRequestResponse {
    pub id: String,
    pub identity_id: String,
    pub kind: RequestKind,
    pub requested_role: Option<BaseRole>,
    pub requested_capabilities: Vec<Capability>,
    pub justification: String,
    pub status: RequestStatus,
    pub granted_capabilities: Option<Vec<Capability>>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requests_start_pending() {
        let req = CapabilityRequest::new_capability_request(
            "identity-1".into(),
            vec![Capability::AgentAccess],
            "need agent tooling".into(),
        );
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(!req.is_decided());
        assert!(req.granted_capabilities.is_none());
    }

    #[test]
    fn role_requests_carry_no_capabilities() {
        let req = CapabilityRequest::new_role_request(
            "identity-1".into(),
            BaseRole::Curator,
            "joining the curation team".into(),
        );
        assert_eq!(req.kind, RequestKind::BaseRole);
        assert_eq!(req.requested_role, Some(BaseRole::Curator));
        assert!(req.requested_capabilities.is_empty());
    }
}
