//! Credential store abstraction.
//!
//! All persisted records live behind these traits so the subsystem can run
//! against MongoDB in production and an in-memory store in tests and
//! embedded use. Every hot path that needs atomic read-modify-write
//! (refresh rotation, API-key status flips, rate windows, workflow
//! decisions) is expressed as a single store operation rather than a
//! read-then-write pair.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    ApiKey, ApiKeyStatus, AuditEntry, AuditQuery, CapabilityRequest, Identity, RequestStatus,
    ReviewRecord, TokenFamily,
};
use platform_core::error::AppError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("concurrent modification")]
    Conflict,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("record not found".to_string()),
            StoreError::Conflict => {
                AppError::WorkflowConflict("concurrent modification".to_string())
            }
            StoreError::Backend(e) => AppError::Database(e),
        }
    }
}

/// Result of an atomic refresh-chain advance.
#[derive(Debug, Clone)]
pub enum AdvanceOutcome {
    /// The presented id was current; the chain moved one step.
    Advanced(TokenFamily),
    /// The presented id was already consumed; the family is now revoked.
    Reused,
    /// The family was already revoked.
    Revoked,
    /// The presented id does not belong to the family's chain.
    Unknown,
    /// No such family.
    NotFound,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    // ==================== Identities ====================

    async fn insert_identity(&self, identity: &Identity) -> Result<(), StoreError>;

    async fn find_identity(&self, id: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_identity_by_subject(&self, subject: &str)
        -> Result<Option<Identity>, StoreError>;

    /// Replace the identity record by id.
    async fn update_identity(&self, identity: &Identity) -> Result<(), StoreError>;

    /// Atomically bump the login counter and stamp the login time.
    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    // ==================== Token families ====================

    async fn insert_family(&self, family: &TokenFamily) -> Result<(), StoreError>;

    async fn find_family(&self, id: &str) -> Result<Option<TokenFamily>, StoreError>;

    /// Atomically advance the refresh chain: succeeds only when `presented`
    /// is the family's current unused token id. A presented id that was
    /// already consumed revokes the entire family and reports `Reused`.
    async fn advance_family(
        &self,
        family_id: &str,
        presented: &str,
        next: &str,
        at: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, StoreError>;

    async fn revoke_family(&self, family_id: &str) -> Result<(), StoreError>;

    /// Revoke every family belonging to an identity, returning the count.
    async fn revoke_families_for_identity(&self, identity_id: &str) -> Result<u64, StoreError>;

    // ==================== API keys ====================

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), StoreError>;

    async fn find_api_key(&self, id: &str) -> Result<Option<ApiKey>, StoreError>;

    async fn find_api_key_by_hash(&self, hash: &str) -> Result<Option<ApiKey>, StoreError>;

    async fn list_api_keys(&self, identity_id: &str) -> Result<Vec<ApiKey>, StoreError>;

    /// Stamp `last_used_at`.
    async fn touch_api_key(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Compare-and-swap the key status. Returns whether this call won the
    /// swap; a lost swap is not an error (lazy expiry races are benign).
    async fn set_api_key_status(
        &self,
        id: &str,
        from: ApiKeyStatus,
        to: ApiKeyStatus,
    ) -> Result<bool, StoreError>;

    // ==================== Capability requests ====================

    async fn insert_request(&self, request: &CapabilityRequest) -> Result<(), StoreError>;

    async fn find_request(&self, id: &str) -> Result<Option<CapabilityRequest>, StoreError>;

    async fn list_requests(
        &self,
        identity_id: Option<&str>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<CapabilityRequest>, StoreError>;

    /// Persist a decision. Succeeds only while the stored record is still
    /// pending; the loser of two concurrent decisions gets `Conflict`.
    async fn decide_request(&self, decided: &CapabilityRequest) -> Result<(), StoreError>;

    // ==================== Audit ====================

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError>;

    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError>;

    // ==================== Rate windows ====================

    /// Atomically increment the counter for `bucket` within the fixed
    /// window starting at `window_start` (unix seconds) and return the new
    /// count. A stale window for the same bucket is reset, not swept.
    async fn incr_window(&self, bucket: &str, window_start: i64) -> Result<u32, StoreError>;
}

/// Review-fragment persistence for collaborator-owned resources.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn insert_review(&self, record: &ReviewRecord) -> Result<(), StoreError>;

    async fn find_review(&self, resource_id: &str) -> Result<Option<ReviewRecord>, StoreError>;

    /// Commit a transition against the version the caller loaded. On
    /// success the stored record (version bumped) is returned; a version
    /// mismatch yields `Conflict`.
    async fn transition_review(&self, record: &ReviewRecord) -> Result<ReviewRecord, StoreError>;
}
