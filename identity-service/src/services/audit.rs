//! Append-only audit logger.

use std::sync::Arc;

use platform_core::error::AppError;

use crate::models::{AuditEntry, AuditQuery};
use crate::store::CredentialStore;

/// Component tag stamped on entries this service records itself.
pub const COMPONENT_IDENTITY: &str = "identity";

const DEFAULT_QUERY_LIMIT: i64 = 50;
const MAX_QUERY_LIMIT: i64 = 200;

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn CredentialStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Record an entry without blocking the caller. A failed append is
    /// logged and dropped; audit writes never fail the audited action.
    pub fn record(&self, entry: AuditEntry) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.append_audit(&entry).await {
                tracing::error!(
                    action = %entry.action,
                    actor_id = %entry.actor_id,
                    "failed to append audit entry: {}",
                    e
                );
            }
        });
    }

    /// Record an entry and wait for the append. Used where the caller needs
    /// the entry durably stored before responding.
    pub async fn record_sync(&self, entry: AuditEntry) -> Result<(), AppError> {
        self.store.append_audit(&entry).await?;
        Ok(())
    }

    /// Query entries, newest first. The limit is clamped to keep a single
    /// page bounded.
    pub async fn query(&self, mut query: AuditQuery) -> Result<Vec<AuditEntry>, AppError> {
        query.limit = Some(
            query
                .limit
                .unwrap_or(DEFAULT_QUERY_LIMIT)
                .clamp(1, MAX_QUERY_LIMIT),
        );
        Ok(self.store.query_audit(&query).await?)
    }
}
