//! In-memory credential store backed by dashmap.
//!
//! Atomicity relies on dashmap's per-shard locking: `get_mut`/`entry` hold
//! the shard lock for the duration of the mutation, which serializes the
//! compare-and-swap paths the same way the MongoDB implementation does with
//! `find_one_and_update`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::RwLock;

use super::{AdvanceOutcome, CredentialStore, ResourceStore, StoreError};
use crate::models::{
    ApiKey, ApiKeyStatus, AuditEntry, AuditQuery, CapabilityRequest, Identity, RequestStatus,
    ReviewRecord, TokenFamily,
};

#[derive(Default)]
pub struct MemoryStore {
    identities: DashMap<String, Identity>,
    families: DashMap<String, TokenFamily>,
    api_keys: DashMap<String, ApiKey>,
    requests: DashMap<String, CapabilityRequest>,
    reviews: DashMap<String, ReviewRecord>,
    audit: RwLock<Vec<AuditEntry>>,
    windows: DashMap<String, (i64, u32)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        self.identities
            .insert(identity.id.clone(), identity.clone());
        Ok(())
    }

    async fn find_identity(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.identities.get(id).map(|e| e.value().clone()))
    }

    async fn find_identity_by_subject(
        &self,
        subject: &str,
    ) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .identities
            .iter()
            .find(|e| e.value().provider_subject == subject)
            .map(|e| e.value().clone()))
    }

    async fn update_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        match self.identities.get_mut(&identity.id) {
            Some(mut entry) => {
                *entry.value_mut() = identity.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        match self.identities.get_mut(id) {
            Some(mut entry) => {
                let identity = entry.value_mut();
                identity.login_count += 1;
                identity.last_login_at = Some(at);
                identity.updated_at = at;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn insert_family(&self, family: &TokenFamily) -> Result<(), StoreError> {
        self.families.insert(family.id.clone(), family.clone());
        Ok(())
    }

    async fn find_family(&self, id: &str) -> Result<Option<TokenFamily>, StoreError> {
        Ok(self.families.get(id).map(|e| e.value().clone()))
    }

    async fn advance_family(
        &self,
        family_id: &str,
        presented: &str,
        next: &str,
        at: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, StoreError> {
        let mut entry = match self.families.get_mut(family_id) {
            Some(entry) => entry,
            None => return Ok(AdvanceOutcome::NotFound),
        };
        let family = entry.value_mut();

        if family.revoked {
            return Ok(AdvanceOutcome::Revoked);
        }
        if family.current_token_id == presented {
            family.issued_token_ids.push(presented.to_string());
            family.current_token_id = next.to_string();
            family.refreshed_at = at;
            return Ok(AdvanceOutcome::Advanced(family.clone()));
        }
        if family.issued_token_ids.iter().any(|t| t == presented) {
            // Theft signal: a consumed id came back. Kill the whole family.
            family.revoked = true;
            return Ok(AdvanceOutcome::Reused);
        }
        Ok(AdvanceOutcome::Unknown)
    }

    async fn revoke_family(&self, family_id: &str) -> Result<(), StoreError> {
        match self.families.get_mut(family_id) {
            Some(mut entry) => {
                entry.value_mut().revoked = true;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn revoke_families_for_identity(&self, identity_id: &str) -> Result<u64, StoreError> {
        let mut revoked = 0;
        for mut entry in self.families.iter_mut() {
            let family = entry.value_mut();
            if family.identity_id == identity_id && !family.revoked {
                family.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), StoreError> {
        self.api_keys.insert(key.id.clone(), key.clone());
        Ok(())
    }

    async fn find_api_key(&self, id: &str) -> Result<Option<ApiKey>, StoreError> {
        Ok(self.api_keys.get(id).map(|e| e.value().clone()))
    }

    async fn find_api_key_by_hash(&self, hash: &str) -> Result<Option<ApiKey>, StoreError> {
        Ok(self
            .api_keys
            .iter()
            .find(|e| e.value().key_hash == hash)
            .map(|e| e.value().clone()))
    }

    async fn list_api_keys(&self, identity_id: &str) -> Result<Vec<ApiKey>, StoreError> {
        let mut keys: Vec<ApiKey> = self
            .api_keys
            .iter()
            .filter(|e| e.value().identity_id == identity_id)
            .map(|e| e.value().clone())
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn touch_api_key(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        match self.api_keys.get_mut(id) {
            Some(mut entry) => {
                entry.value_mut().last_used_at = Some(at);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn set_api_key_status(
        &self,
        id: &str,
        from: ApiKeyStatus,
        to: ApiKeyStatus,
    ) -> Result<bool, StoreError> {
        match self.api_keys.get_mut(id) {
            Some(mut entry) => {
                let key = entry.value_mut();
                if key.status == from {
                    key.status = to;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn insert_request(&self, request: &CapabilityRequest) -> Result<(), StoreError> {
        self.requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn find_request(&self, id: &str) -> Result<Option<CapabilityRequest>, StoreError> {
        Ok(self.requests.get(id).map(|e| e.value().clone()))
    }

    async fn list_requests(
        &self,
        identity_id: Option<&str>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<CapabilityRequest>, StoreError> {
        let mut requests: Vec<CapabilityRequest> = self
            .requests
            .iter()
            .filter(|e| {
                identity_id.map_or(true, |id| e.value().identity_id == id)
                    && status.map_or(true, |s| e.value().status == s)
            })
            .map(|e| e.value().clone())
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn decide_request(&self, decided: &CapabilityRequest) -> Result<(), StoreError> {
        match self.requests.get_mut(&decided.id) {
            Some(mut entry) => {
                if entry.value().status != RequestStatus::Pending {
                    return Err(StoreError::Conflict);
                }
                *entry.value_mut() = decided.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.audit
            .write()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("audit lock poisoned")))?
            .push(entry.clone());
        Ok(())
    }

    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        let entries = self
            .audit
            .read()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("audit lock poisoned")))?;

        let mut matched: Vec<AuditEntry> = entries
            .iter()
            .filter(|e| {
                query.actor_id.as_deref().map_or(true, |v| e.actor_id == v)
                    && query.action.as_deref().map_or(true, |v| e.action == v)
                    && query
                        .resource_type
                        .as_deref()
                        .map_or(true, |v| e.resource_type.as_deref() == Some(v))
                    && query
                        .resource_id
                        .as_deref()
                        .map_or(true, |v| e.resource_id.as_deref() == Some(v))
                    && query
                        .component
                        .as_deref()
                        .map_or(true, |v| e.component == v)
                    && query.from.map_or(true, |v| e.timestamp >= v)
                    && query.to.map_or(true, |v| e.timestamp <= v)
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.unwrap_or(i64::MAX).max(0) as usize;
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn incr_window(&self, bucket: &str, window_start: i64) -> Result<u32, StoreError> {
        let mut entry = self
            .windows
            .entry(bucket.to_string())
            .or_insert((window_start, 0));
        if entry.value().0 != window_start {
            *entry.value_mut() = (window_start, 0);
        }
        entry.value_mut().1 += 1;
        Ok(entry.value().1)
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn insert_review(&self, record: &ReviewRecord) -> Result<(), StoreError> {
        self.reviews
            .insert(record.resource_id.clone(), record.clone());
        Ok(())
    }

    async fn find_review(&self, resource_id: &str) -> Result<Option<ReviewRecord>, StoreError> {
        Ok(self.reviews.get(resource_id).map(|e| e.value().clone()))
    }

    async fn transition_review(&self, record: &ReviewRecord) -> Result<ReviewRecord, StoreError> {
        match self.reviews.get_mut(&record.resource_id) {
            Some(mut entry) => {
                if entry.value().version != record.version {
                    return Err(StoreError::Conflict);
                }
                let mut stored = record.clone();
                stored.version += 1;
                stored.updated_at = Utc::now();
                *entry.value_mut() = stored.clone();
                Ok(stored)
            }
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewStatus;

    #[tokio::test]
    async fn advance_family_rotates_exactly_one_step() {
        let store = MemoryStore::new();
        let family = TokenFamily::new("identity-1".into(), "t1".into(), 7);
        store.insert_family(&family).await.unwrap();

        let outcome = store
            .advance_family(&family.id, "t1", "t2", Utc::now())
            .await
            .unwrap();
        match outcome {
            AdvanceOutcome::Advanced(f) => {
                assert_eq!(f.current_token_id, "t2");
                assert_eq!(f.issued_token_ids, vec!["t1".to_string()]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn replaying_a_consumed_id_revokes_the_family() {
        let store = MemoryStore::new();
        let family = TokenFamily::new("identity-1".into(), "t1".into(), 7);
        store.insert_family(&family).await.unwrap();

        store
            .advance_family(&family.id, "t1", "t2", Utc::now())
            .await
            .unwrap();
        let outcome = store
            .advance_family(&family.id, "t1", "t3", Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, AdvanceOutcome::Reused));

        // The newest id is now unusable too.
        let outcome = store
            .advance_family(&family.id, "t2", "t4", Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, AdvanceOutcome::Revoked));
    }

    #[tokio::test]
    async fn concurrent_advances_admit_exactly_one_winner() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let family = TokenFamily::new("identity-1".into(), "t1".into(), 7);
        store.insert_family(&family).await.unwrap();

        let a = {
            let store = store.clone();
            let id = family.id.clone();
            tokio::spawn(
                async move { store.advance_family(&id, "t1", "ta", Utc::now()).await },
            )
        };
        let b = {
            let store = store.clone();
            let id = family.id.clone();
            tokio::spawn(
                async move { store.advance_family(&id, "t1", "tb", Utc::now()).await },
            )
        };

        let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        let advanced = outcomes
            .iter()
            .filter(|o| matches!(o, AdvanceOutcome::Advanced(_)))
            .count();
        assert_eq!(advanced, 1);
    }

    #[tokio::test]
    async fn decide_request_rejects_second_decision() {
        let store = MemoryStore::new();
        let request = CapabilityRequest::new_role_request(
            "identity-1".into(),
            crate::models::BaseRole::Curator,
            "please".into(),
        );
        store.insert_request(&request).await.unwrap();

        let mut decided = request.clone();
        decided.status = RequestStatus::Approved;
        store.decide_request(&decided).await.unwrap();

        let mut second = request.clone();
        second.status = RequestStatus::Rejected;
        assert!(matches!(
            store.decide_request(&second).await,
            Err(StoreError::Conflict)
        ));
    }

    #[tokio::test]
    async fn transition_review_enforces_version() {
        let store = MemoryStore::new();
        let record = ReviewRecord::new("res-1".into(), "article".into(), "id-1".into());
        store.insert_review(&record).await.unwrap();

        let mut first = record.clone();
        first.status = ReviewStatus::PendingReview;
        let stored = store.transition_review(&first).await.unwrap();
        assert_eq!(stored.version, 1);

        // A transition carrying the stale version loses.
        let mut stale = record.clone();
        stale.status = ReviewStatus::Published;
        assert!(matches!(
            store.transition_review(&stale).await,
            Err(StoreError::Conflict)
        ));
    }

    #[tokio::test]
    async fn incr_window_resets_stale_windows() {
        let store = MemoryStore::new();
        assert_eq!(store.incr_window("min:id-1", 60).await.unwrap(), 1);
        assert_eq!(store.incr_window("min:id-1", 60).await.unwrap(), 2);
        // New window for the same bucket starts over.
        assert_eq!(store.incr_window("min:id-1", 120).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn audit_query_orders_newest_first_and_pages() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let mut entry = AuditEntry::new(
                "actor-1",
                format!("action.{}", i),
                "identity",
                crate::models::AuthMethod::AccessToken,
            );
            entry.timestamp = Utc::now() + chrono::Duration::seconds(i);
            store.append_audit(&entry).await.unwrap();
        }

        let query = AuditQuery {
            actor_id: Some("actor-1".into()),
            limit: Some(2),
            offset: Some(1),
            ..Default::default()
        };
        let page = store.query_audit(&query).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].action, "action.3");
        assert_eq!(page[1].action, "action.2");
    }
}
