//! Capability-request workflow: identity-initiated role or capability
//! changes, terminated by a single administrator decision.

use std::sync::Arc;

use chrono::Utc;

use platform_core::error::AppError;

use crate::models::{
    Actor, AuditEntry, AuthMethod, BaseRole, Capability, CapabilityRequest, ClientMeta,
    Permission, RequestStatus,
};
use crate::services::audit::{AuditLogger, COMPONENT_IDENTITY};
use crate::services::permissions;
use crate::store::CredentialStore;

#[derive(Clone)]
pub struct RequestWorkflow {
    store: Arc<dyn CredentialStore>,
    audit: AuditLogger,
}

impl RequestWorkflow {
    pub fn new(store: Arc<dyn CredentialStore>, audit: AuditLogger) -> Self {
        Self { store, audit }
    }

    /// Submit a base-role change request.
    pub async fn submit_role_request(
        &self,
        actor: &Actor,
        role: BaseRole,
        justification: String,
        meta: &ClientMeta,
    ) -> Result<CapabilityRequest, AppError> {
        if actor.base_role == Some(role) {
            return Err(AppError::BadRequest("role already held".to_string()));
        }
        let request = CapabilityRequest::new_role_request(actor.id.clone(), role, justification);
        self.store.insert_request(&request).await?;
        self.audit.record(
            AuditEntry::new(
                actor.id.clone(),
                "request.submit",
                COMPONENT_IDENTITY,
                AuthMethod::AccessToken,
            )
            .with_resource("capability_request", request.id.clone())
            .with_detail(serde_json::json!({ "kind": "base_role", "role": role }))
            .with_client(meta),
        );
        Ok(request)
    }

    /// Submit a capability grant request. Capabilities only extend the
    /// curator role, so other tiers cannot request them.
    pub async fn submit_capability_request(
        &self,
        actor: &Actor,
        capabilities: Vec<Capability>,
        justification: String,
        meta: &ClientMeta,
    ) -> Result<CapabilityRequest, AppError> {
        if actor.base_role != Some(BaseRole::Curator) {
            return Err(AppError::AuthorizationDenied(
                "capabilities require the curator role".to_string(),
            ));
        }
        let missing: Vec<Capability> = capabilities
            .into_iter()
            .filter(|c| !actor.capabilities.contains(c))
            .collect();
        if missing.is_empty() {
            return Err(AppError::BadRequest(
                "requested capabilities already held".to_string(),
            ));
        }
        let request =
            CapabilityRequest::new_capability_request(actor.id.clone(), missing, justification);
        self.store.insert_request(&request).await?;
        self.audit.record(
            AuditEntry::new(
                actor.id.clone(),
                "request.submit",
                COMPONENT_IDENTITY,
                AuthMethod::AccessToken,
            )
            .with_resource("capability_request", request.id.clone())
            .with_detail(
                serde_json::json!({ "kind": "capability", "capabilities": request.requested_capabilities }),
            )
            .with_client(meta),
        );
        Ok(request)
    }

    pub async fn get(&self, id: &str) -> Result<CapabilityRequest, AppError> {
        self.store
            .find_request(id)
            .await?
            .ok_or_else(|| AppError::NotFound("capability request".to_string()))
    }

    pub async fn list(
        &self,
        identity_id: Option<&str>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<CapabilityRequest>, AppError> {
        Ok(self.store.list_requests(identity_id, status).await?)
    }

    /// Approve a pending request, optionally narrowing a capability request
    /// to a granted subset. Exactly one concurrent decision wins; the loser
    /// gets a conflict. The identity side effect is applied only after the
    /// decision is committed.
    pub async fn approve(
        &self,
        decider: &Actor,
        request_id: &str,
        granted: Option<Vec<Capability>>,
        notes: Option<String>,
        meta: &ClientMeta,
    ) -> Result<CapabilityRequest, AppError> {
        let request = self.get(request_id).await?;
        self.guard_decider(decider, &request)?;

        let granted = match granted {
            // A narrowed grant is recorded on the same request; anything
            // outside the requested set is silently ignored.
            Some(subset) => subset
                .into_iter()
                .filter(|c| request.requested_capabilities.contains(c))
                .collect(),
            None => request.requested_capabilities.clone(),
        };

        let mut decided = request.clone();
        decided.status = RequestStatus::Approved;
        decided.granted_capabilities = Some(granted.clone());
        decided.decided_by = Some(decider.id.clone());
        decided.decided_at = Some(Utc::now());
        decided.decision_notes = notes;
        self.store.decide_request(&decided).await?;

        let mut identity = self
            .store
            .find_identity(&request.identity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("identity".to_string()))?;
        if let Some(role) = request.requested_role {
            identity.assign_role(role);
        } else {
            identity.grant_capabilities(&granted);
        }
        self.store.update_identity(&identity).await?;

        self.audit.record(
            AuditEntry::new(
                decider.id.clone(),
                "request.approve",
                COMPONENT_IDENTITY,
                AuthMethod::AccessToken,
            )
            .with_resource("capability_request", decided.id.clone())
            .with_detail(serde_json::json!({
                "identity_id": decided.identity_id,
                "granted": decided.granted_capabilities,
            }))
            .with_client(meta),
        );
        Ok(decided)
    }

    /// Reject a pending request. No identity side effect.
    pub async fn reject(
        &self,
        decider: &Actor,
        request_id: &str,
        notes: Option<String>,
        meta: &ClientMeta,
    ) -> Result<CapabilityRequest, AppError> {
        let request = self.get(request_id).await?;
        self.guard_decider(decider, &request)?;

        let mut decided = request;
        decided.status = RequestStatus::Rejected;
        decided.decided_by = Some(decider.id.clone());
        decided.decided_at = Some(Utc::now());
        decided.decision_notes = notes;
        self.store.decide_request(&decided).await?;

        self.audit.record(
            AuditEntry::new(
                decider.id.clone(),
                "request.reject",
                COMPONENT_IDENTITY,
                AuthMethod::AccessToken,
            )
            .with_resource("capability_request", decided.id.clone())
            .with_detail(serde_json::json!({ "identity_id": decided.identity_id }))
            .with_client(meta),
        );
        Ok(decided)
    }

    /// Decisions are administrator-only, never on the decider's own
    /// request, and never on an already-decided one. Enforced here so
    /// embedders of the workflow get the same guarantees as the HTTP
    /// surface.
    fn guard_decider(&self, decider: &Actor, request: &CapabilityRequest) -> Result<(), AppError> {
        permissions::require_permission(decider, Permission::IdentityManage)?;
        if request.identity_id == decider.id {
            return Err(AppError::AuthorizationDenied(
                "cannot decide your own request".to_string(),
            ));
        }
        if request.is_decided() {
            return Err(AppError::WorkflowConflict(
                "request already decided".to_string(),
            ));
        }
        Ok(())
    }
}
