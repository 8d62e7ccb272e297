//! Review record - the shared status+review-metadata fragment embedded by
//! every collaborator's resource records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Draft,
    PendingReview,
    Published,
    Rejected,
    ChangesRequested,
}

impl ReviewStatus {
    /// Terminal states admit no further review transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewStatus::Published | ReviewStatus::Rejected)
    }
}

/// Review state for one collaborator-owned resource. The collaborator owns
/// the resource's domain fields; this fragment owns its lifecycle. The
/// `version` counter backs optimistic concurrency: a transition only
/// commits against the version it loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub resource_id: String,

    /// Collaborator-supplied type tag, e.g. "knowledge_article".
    pub resource_type: String,

    pub created_by: String,

    /// Administrator-seeded content: created directly in `published` and
    /// immutable to every identity except administrators.
    #[serde(default)]
    pub is_day_zero: bool,

    pub status: ReviewStatus,

    pub reviewed_by: Option<String>,

    pub decided_at: Option<DateTime<Utc>>,

    pub review_comments: Option<String>,

    #[serde(default)]
    pub version: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ReviewRecord {
    /// Register a new draft for a collaborator resource.
    pub fn new(resource_id: String, resource_type: String, created_by: String) -> Self {
        let now = Utc::now();
        Self {
            resource_id,
            resource_type,
            created_by,
            is_day_zero: false,
            status: ReviewStatus::Draft,
            reviewed_by: None,
            decided_at: None,
            review_comments: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Administrator-seeded content bypasses review entirely.
    pub fn day_zero(resource_id: String, resource_type: String, created_by: String) -> Self {
        let now = Utc::now();
        Self {
            resource_id,
            resource_type,
            created_by,
            is_day_zero: true,
            status: ReviewStatus::Published,
            reviewed_by: None,
            decided_at: None,
            review_comments: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
