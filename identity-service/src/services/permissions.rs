//! Permission resolver - pure static mapping from role and capabilities to
//! effective permission sets, plus the resource visibility rules.

use std::collections::BTreeSet;

use platform_core::error::AppError;

use crate::models::{Actor, BaseRole, Capability, Permission, ReviewRecord, ReviewStatus};

/// Permissions granted by a base role alone.
pub fn base_permissions(role: BaseRole) -> &'static [Permission] {
    match role {
        BaseRole::Administrator => Permission::ALL,
        BaseRole::Curator => &[
            Permission::KnowledgeRead,
            Permission::KnowledgeWrite,
            Permission::ModelRead,
            Permission::ModelWrite,
            Permission::ApiKeyManage,
        ],
        BaseRole::Explorator => &[
            Permission::KnowledgeRead,
            Permission::ModelRead,
            Permission::ApiKeyManage,
        ],
    }
}

/// The single permission each additive capability unlocks.
pub fn capability_permission(capability: Capability) -> Permission {
    match capability {
        Capability::AgentAccess => Permission::AgentInvoke,
        Capability::AnalyticsAccess => Permission::AnalyticsView,
        Capability::ReviewerStatus => Permission::ContentReview,
    }
}

/// Resolve the effective permission set: base-role permissions plus one
/// permission per held capability. An actor with no role resolves to the
/// empty set.
pub fn effective_permissions(actor: &Actor) -> BTreeSet<Permission> {
    let mut set = BTreeSet::new();
    if let Some(role) = actor.base_role {
        set.extend(base_permissions(role).iter().copied());
        if role == BaseRole::Curator {
            set.extend(actor.capabilities.iter().map(|c| capability_permission(*c)));
        }
    }
    set
}

pub fn has_permission(actor: &Actor, permission: Permission) -> bool {
    effective_permissions(actor).contains(&permission)
}

/// Require a permission, failing with the name of the missing permission.
pub fn require_permission(actor: &Actor, permission: Permission) -> Result<(), AppError> {
    if has_permission(actor, permission) {
        Ok(())
    } else {
        Err(AppError::missing_permission(permission))
    }
}

/// Whether the actor may see a reviewed resource. Published content is
/// visible to every active identity; in-review content to its creator,
/// reviewers, and administrators; rejected content only to its creator
/// and administrators.
pub fn can_view(actor: &Actor, record: &ReviewRecord) -> bool {
    if actor.is_admin() || record.created_by == actor.id {
        return true;
    }
    match record.status {
        ReviewStatus::Published => true,
        ReviewStatus::PendingReview | ReviewStatus::ChangesRequested => {
            has_permission(actor, Permission::ContentReview)
        }
        ReviewStatus::Draft | ReviewStatus::Rejected => false,
    }
}

/// Check edit rights on a reviewed resource. Administrators may always
/// edit; day-zero content is immutable to everyone else. Creators may edit
/// while the resource is draft, in review, or sent back for changes.
/// Reviewers may edit only while the resource is pending review, and never
/// their own resource.
pub fn check_edit(actor: &Actor, record: &ReviewRecord) -> Result<(), AppError> {
    if actor.is_admin() {
        return Ok(());
    }
    if record.is_day_zero {
        return Err(AppError::AuthorizationDenied(
            "day-zero content is immutable".to_string(),
        ));
    }
    let editable_by_creator = matches!(
        record.status,
        ReviewStatus::Draft | ReviewStatus::PendingReview | ReviewStatus::ChangesRequested
    );
    if record.created_by == actor.id {
        return if editable_by_creator {
            Ok(())
        } else {
            Err(AppError::AuthorizationDenied(
                "resource is no longer editable".to_string(),
            ))
        };
    }
    if has_permission(actor, Permission::ContentReview) {
        return if record.status == ReviewStatus::PendingReview {
            Ok(())
        } else {
            Err(AppError::AuthorizationDenied(
                "reviewers may only edit resources pending review".to_string(),
            ))
        };
    }
    Err(AppError::AuthorizationDenied(
        "not the resource owner".to_string(),
    ))
}

pub fn can_edit(actor: &Actor, record: &ReviewRecord) -> bool {
    check_edit(actor, record).is_ok()
}

/// Guard for review decisions. Reviewer or administrator only, and never
/// on the actor's own resource; self-review gets its own error so callers
/// can distinguish it from a plain permission miss.
pub fn check_review(actor: &Actor, record: &ReviewRecord) -> Result<(), AppError> {
    if !actor.is_admin() && !has_permission(actor, Permission::ContentReview) {
        return Err(AppError::missing_permission(Permission::ContentReview));
    }
    if record.created_by == actor.id {
        return Err(AppError::AuthorizationDenied(
            "self-review is forbidden".to_string(),
        ));
    }
    Ok(())
}
