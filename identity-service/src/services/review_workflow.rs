//! Review workflow: draft -> pending_review -> published/rejected, with
//! changes_requested looping back through resubmission.
//!
//! Transitions commit with optimistic concurrency against the record
//! version, so two decisions racing on the same pending resource cannot
//! both land.

use std::sync::Arc;

use chrono::Utc;

use platform_core::error::AppError;

use crate::models::{Actor, AuditEntry, AuthMethod, ClientMeta, ReviewRecord, ReviewStatus};
use crate::services::audit::{AuditLogger, COMPONENT_IDENTITY};
use crate::services::permissions;
use crate::store::ResourceStore;

#[derive(Clone)]
pub struct ReviewWorkflow {
    resources: Arc<dyn ResourceStore>,
    audit: AuditLogger,
}

impl ReviewWorkflow {
    pub fn new(resources: Arc<dyn ResourceStore>, audit: AuditLogger) -> Self {
        Self { resources, audit }
    }

    /// Register a collaborator resource for review, starting in draft.
    pub async fn register(
        &self,
        actor: &Actor,
        resource_id: &str,
        resource_type: &str,
    ) -> Result<ReviewRecord, AppError> {
        if self.resources.find_review(resource_id).await?.is_some() {
            return Err(AppError::WorkflowConflict(
                "resource already registered".to_string(),
            ));
        }
        let record = ReviewRecord::new(
            resource_id.to_string(),
            resource_type.to_string(),
            actor.id.clone(),
        );
        self.resources.insert_review(&record).await?;
        Ok(record)
    }

    /// Seed administrator content directly into published. Day-zero records
    /// never pass through review and stay immutable to non-administrators.
    pub async fn seed_day_zero(
        &self,
        actor: &Actor,
        resource_id: &str,
        resource_type: &str,
        meta: &ClientMeta,
    ) -> Result<ReviewRecord, AppError> {
        if !actor.is_admin() {
            return Err(AppError::AuthorizationDenied(
                "only administrators may seed day-zero content".to_string(),
            ));
        }
        if self.resources.find_review(resource_id).await?.is_some() {
            return Err(AppError::WorkflowConflict(
                "resource already registered".to_string(),
            ));
        }
        let record = ReviewRecord::day_zero(
            resource_id.to_string(),
            resource_type.to_string(),
            actor.id.clone(),
        );
        self.resources.insert_review(&record).await?;
        self.record_transition(actor, &record, "review.seed", meta);
        Ok(record)
    }

    pub async fn get(&self, actor: &Actor, resource_id: &str) -> Result<ReviewRecord, AppError> {
        let record = self.load(resource_id).await?;
        if !permissions::can_view(actor, &record) {
            // Invisible resources read as absent.
            return Err(AppError::NotFound("resource".to_string()));
        }
        Ok(record)
    }

    /// Creator submits a draft (or a changes_requested resource) for review.
    pub async fn submit(
        &self,
        actor: &Actor,
        resource_id: &str,
        meta: &ClientMeta,
    ) -> Result<ReviewRecord, AppError> {
        let record = self.load(resource_id).await?;
        if record.created_by != actor.id && !actor.is_admin() {
            return Err(AppError::AuthorizationDenied(
                "only the creator may submit for review".to_string(),
            ));
        }
        if record.is_day_zero {
            return Err(AppError::WorkflowConflict(
                "day-zero content does not enter review".to_string(),
            ));
        }
        if !matches!(
            record.status,
            ReviewStatus::Draft | ReviewStatus::ChangesRequested
        ) {
            return Err(AppError::WorkflowConflict(format!(
                "cannot submit from {:?}",
                record.status
            )));
        }

        let mut next = record;
        next.status = ReviewStatus::PendingReview;
        let stored = self.resources.transition_review(&next).await?;
        self.record_transition(actor, &stored, "review.submit", meta);
        Ok(stored)
    }

    pub async fn approve(
        &self,
        actor: &Actor,
        resource_id: &str,
        comments: Option<String>,
        meta: &ClientMeta,
    ) -> Result<ReviewRecord, AppError> {
        self.decide(actor, resource_id, ReviewStatus::Published, comments, meta)
            .await
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        resource_id: &str,
        comments: Option<String>,
        meta: &ClientMeta,
    ) -> Result<ReviewRecord, AppError> {
        self.decide(actor, resource_id, ReviewStatus::Rejected, comments, meta)
            .await
    }

    pub async fn request_changes(
        &self,
        actor: &Actor,
        resource_id: &str,
        comments: Option<String>,
        meta: &ClientMeta,
    ) -> Result<ReviewRecord, AppError> {
        self.decide(
            actor,
            resource_id,
            ReviewStatus::ChangesRequested,
            comments,
            meta,
        )
        .await
    }

    async fn decide(
        &self,
        actor: &Actor,
        resource_id: &str,
        to: ReviewStatus,
        comments: Option<String>,
        meta: &ClientMeta,
    ) -> Result<ReviewRecord, AppError> {
        let record = self.load(resource_id).await?;
        permissions::check_review(actor, &record)?;
        if record.is_day_zero {
            return Err(AppError::WorkflowConflict(
                "day-zero content does not enter review".to_string(),
            ));
        }
        if record.status != ReviewStatus::PendingReview {
            return Err(AppError::WorkflowConflict(format!(
                "cannot decide from {:?}",
                record.status
            )));
        }

        let mut next = record;
        next.status = to;
        next.reviewed_by = Some(actor.id.clone());
        next.decided_at = Some(Utc::now());
        next.review_comments = comments;
        let stored = self.resources.transition_review(&next).await?;

        let action = match to {
            ReviewStatus::Published => "review.approve",
            ReviewStatus::Rejected => "review.reject",
            _ => "review.request_changes",
        };
        self.record_transition(actor, &stored, action, meta);
        Ok(stored)
    }

    async fn load(&self, resource_id: &str) -> Result<ReviewRecord, AppError> {
        self.resources
            .find_review(resource_id)
            .await?
            .ok_or_else(|| AppError::NotFound("resource".to_string()))
    }

    fn record_transition(&self, actor: &Actor, record: &ReviewRecord, action: &str, meta: &ClientMeta) {
        self.audit.record(
            AuditEntry::new(
                actor.id.clone(),
                action,
                COMPONENT_IDENTITY,
                AuthMethod::AccessToken,
            )
            .with_resource(record.resource_type.clone(), record.resource_id.clone())
            .with_detail(serde_json::json!({ "status": record.status }))
            .with_client(meta),
        );
    }
}
