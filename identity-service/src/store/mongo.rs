//! MongoDB credential store.
//!
//! Compare-and-swap paths use `find_one_and_update` / filtered updates so
//! concurrent requests never interleave a read with a later write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, Bson, Document},
    options::{ClientOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};

use super::{AdvanceOutcome, CredentialStore, ResourceStore, StoreError};
use crate::models::{
    ApiKey, ApiKeyStatus, AuditEntry, AuditQuery, CapabilityRequest, Identity, RequestStatus,
    ReviewRecord, TokenFamily,
};

const DEFAULT_AUDIT_LIMIT: i64 = 50;
const MAX_AUDIT_LIMIT: i64 = 200;

/// Counter documents are keyed per window start and never reused, so the
/// TTL only has to outlast the longest (daily) granularity.
const RATE_WINDOW_TTL: std::time::Duration = std::time::Duration::from_secs(2 * 86_400);

/// Fixed-window rate counter document. `touched_at` backs the TTL index
/// that reaps windows after they roll over.
#[derive(Debug, Serialize, Deserialize)]
struct RateWindow {
    #[serde(rename = "_id")]
    id: String,
    window_start: i64,
    count: i64,
    touched_at: mongodb::bson::DateTime,
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("invalid MongoDB URI: {}", e)))?;
        let client = Client::with_options(options)
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("MongoDB client error: {}", e)))?;
        Ok(Self {
            db: client.database(database),
        })
    }

    fn identities(&self) -> Collection<Identity> {
        self.db.collection("identities")
    }

    fn families(&self) -> Collection<TokenFamily> {
        self.db.collection("token_families")
    }

    fn api_keys(&self) -> Collection<ApiKey> {
        self.db.collection("api_keys")
    }

    fn requests(&self) -> Collection<CapabilityRequest> {
        self.db.collection("capability_requests")
    }

    fn audit_entries(&self) -> Collection<AuditEntry> {
        self.db.collection("audit_entries")
    }

    fn rate_windows(&self) -> Collection<RateWindow> {
        self.db.collection("rate_windows")
    }

    fn reviews(&self) -> Collection<ReviewRecord> {
        self.db.collection("resource_reviews")
    }

    /// Create the unique indexes the lookup paths rely on, plus the TTL
    /// index that keeps `rate_windows` from accumulating dead windows.
    pub async fn initialize_indexes(&self) -> Result<(), StoreError> {
        let unique = |keys: Document| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build()
        };

        self.identities()
            .create_index(unique(doc! { "provider_subject": 1 }), None)
            .await
            .map_err(backend)?;
        self.api_keys()
            .create_index(unique(doc! { "key_hash": 1 }), None)
            .await
            .map_err(backend)?;
        self.reviews()
            .create_index(unique(doc! { "resource_id": 1 }), None)
            .await
            .map_err(backend)?;
        self.families()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "identity_id": 1 })
                    .build(),
                None,
            )
            .await
            .map_err(backend)?;
        self.audit_entries()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "actor_id": 1, "timestamp": -1 })
                    .build(),
                None,
            )
            .await
            .map_err(backend)?;
        self.rate_windows()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "touched_at": 1 })
                    .options(IndexOptions::builder().expire_after(RATE_WINDOW_TTL).build())
                    .build(),
                None,
            )
            .await
            .map_err(backend)?;
        Ok(())
    }
}

fn backend(e: mongodb::error::Error) -> StoreError {
    StoreError::Backend(anyhow::anyhow!(e))
}

fn bson_of<T: Serialize>(value: &T) -> Result<Bson, StoreError> {
    to_bson(value).map_err(|e| StoreError::Backend(anyhow::anyhow!(e)))
}

#[async_trait]
impl CredentialStore for MongoStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn insert_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        self.identities()
            .insert_one(identity, None)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn find_identity(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        self.identities()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(backend)
    }

    async fn find_identity_by_subject(
        &self,
        subject: &str,
    ) -> Result<Option<Identity>, StoreError> {
        self.identities()
            .find_one(doc! { "provider_subject": subject }, None)
            .await
            .map_err(backend)
    }

    async fn update_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        let result = self
            .identities()
            .replace_one(doc! { "_id": &identity.id }, identity, None)
            .await
            .map_err(backend)?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let at = bson_of(&at)?;
        let result = self
            .identities()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$inc": { "login_count": 1i64 },
                    "$set": { "last_login_at": &at, "updated_at": &at },
                },
                None,
            )
            .await
            .map_err(backend)?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_family(&self, family: &TokenFamily) -> Result<(), StoreError> {
        self.families()
            .insert_one(family, None)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn find_family(&self, id: &str) -> Result<Option<TokenFamily>, StoreError> {
        self.families()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(backend)
    }

    async fn advance_family(
        &self,
        family_id: &str,
        presented: &str,
        next: &str,
        at: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let advanced = self
            .families()
            .find_one_and_update(
                doc! {
                    "_id": family_id,
                    "revoked": false,
                    "current_token_id": presented,
                },
                doc! {
                    "$set": { "current_token_id": next, "refreshed_at": bson_of(&at)? },
                    "$push": { "issued_token_ids": presented },
                },
                options,
            )
            .await
            .map_err(backend)?;

        if let Some(family) = advanced {
            return Ok(AdvanceOutcome::Advanced(family));
        }

        // The swap missed; classify why against the current record.
        match self.find_family(family_id).await? {
            None => Ok(AdvanceOutcome::NotFound),
            Some(family) if family.revoked => Ok(AdvanceOutcome::Revoked),
            Some(family) if family.issued_token_ids.iter().any(|t| t == presented) => {
                self.revoke_family(family_id).await?;
                Ok(AdvanceOutcome::Reused)
            }
            Some(_) => Ok(AdvanceOutcome::Unknown),
        }
    }

    async fn revoke_family(&self, family_id: &str) -> Result<(), StoreError> {
        let result = self
            .families()
            .update_one(
                doc! { "_id": family_id },
                doc! { "$set": { "revoked": true } },
                None,
            )
            .await
            .map_err(backend)?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn revoke_families_for_identity(&self, identity_id: &str) -> Result<u64, StoreError> {
        let result = self
            .families()
            .update_many(
                doc! { "identity_id": identity_id, "revoked": false },
                doc! { "$set": { "revoked": true } },
                None,
            )
            .await
            .map_err(backend)?;
        Ok(result.modified_count)
    }

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), StoreError> {
        self.api_keys()
            .insert_one(key, None)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn find_api_key(&self, id: &str) -> Result<Option<ApiKey>, StoreError> {
        self.api_keys()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(backend)
    }

    async fn find_api_key_by_hash(&self, hash: &str) -> Result<Option<ApiKey>, StoreError> {
        self.api_keys()
            .find_one(doc! { "key_hash": hash }, None)
            .await
            .map_err(backend)
    }

    async fn list_api_keys(&self, identity_id: &str) -> Result<Vec<ApiKey>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self
            .api_keys()
            .find(doc! { "identity_id": identity_id }, options)
            .await
            .map_err(backend)?;
        cursor.try_collect().await.map_err(backend)
    }

    async fn touch_api_key(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.api_keys()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "last_used_at": bson_of(&at)? } },
                None,
            )
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn set_api_key_status(
        &self,
        id: &str,
        from: ApiKeyStatus,
        to: ApiKeyStatus,
    ) -> Result<bool, StoreError> {
        let result = self
            .api_keys()
            .update_one(
                doc! { "_id": id, "status": bson_of(&from)? },
                doc! { "$set": { "status": bson_of(&to)? } },
                None,
            )
            .await
            .map_err(backend)?;
        Ok(result.modified_count == 1)
    }

    async fn insert_request(&self, request: &CapabilityRequest) -> Result<(), StoreError> {
        self.requests()
            .insert_one(request, None)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn find_request(&self, id: &str) -> Result<Option<CapabilityRequest>, StoreError> {
        self.requests()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(backend)
    }

    async fn list_requests(
        &self,
        identity_id: Option<&str>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<CapabilityRequest>, StoreError> {
        let mut filter = Document::new();
        if let Some(id) = identity_id {
            filter.insert("identity_id", id);
        }
        if let Some(status) = status {
            filter.insert("status", bson_of(&status)?);
        }
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self
            .requests()
            .find(filter, options)
            .await
            .map_err(backend)?;
        cursor.try_collect().await.map_err(backend)
    }

    async fn decide_request(&self, decided: &CapabilityRequest) -> Result<(), StoreError> {
        let result = self
            .requests()
            .replace_one(
                doc! { "_id": &decided.id, "status": bson_of(&RequestStatus::Pending)? },
                decided,
                None,
            )
            .await
            .map_err(backend)?;
        if result.matched_count == 1 {
            return Ok(());
        }
        // Lost the swap: distinguish "already decided" from "no such record".
        match self.find_request(&decided.id).await? {
            Some(_) => Err(StoreError::Conflict),
            None => Err(StoreError::NotFound),
        }
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.audit_entries()
            .insert_one(entry, None)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        let mut filter = Document::new();
        if let Some(v) = &query.actor_id {
            filter.insert("actor_id", v);
        }
        if let Some(v) = &query.action {
            filter.insert("action", v);
        }
        if let Some(v) = &query.resource_type {
            filter.insert("resource_type", v);
        }
        if let Some(v) = &query.resource_id {
            filter.insert("resource_id", v);
        }
        if let Some(v) = &query.component {
            filter.insert("component", v);
        }
        let mut range = Document::new();
        if let Some(from) = &query.from {
            range.insert("$gte", bson_of(from)?);
        }
        if let Some(to) = &query.to {
            range.insert("$lte", bson_of(to)?);
        }
        if !range.is_empty() {
            filter.insert("timestamp", range);
        }

        let limit = query
            .limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT);
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": -1 })
            .skip(query.offset)
            .limit(limit)
            .build();
        let cursor = self
            .audit_entries()
            .find(filter, options)
            .await
            .map_err(backend)?;
        cursor.try_collect().await.map_err(backend)
    }

    async fn incr_window(&self, bucket: &str, window_start: i64) -> Result<u32, StoreError> {
        let id = format!("{}:{}", bucket, window_start);
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let window = self
            .rate_windows()
            .find_one_and_update(
                doc! { "_id": &id },
                doc! {
                    "$inc": { "count": 1i64 },
                    "$setOnInsert": { "window_start": window_start },
                    "$currentDate": { "touched_at": true },
                },
                options,
            )
            .await
            .map_err(backend)?;
        Ok(window.map(|w| w.count as u32).unwrap_or(1))
    }
}

#[async_trait]
impl ResourceStore for MongoStore {
    async fn insert_review(&self, record: &ReviewRecord) -> Result<(), StoreError> {
        self.reviews()
            .insert_one(record, None)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn find_review(&self, resource_id: &str) -> Result<Option<ReviewRecord>, StoreError> {
        self.reviews()
            .find_one(doc! { "resource_id": resource_id }, None)
            .await
            .map_err(backend)
    }

    async fn transition_review(&self, record: &ReviewRecord) -> Result<ReviewRecord, StoreError> {
        let mut stored = record.clone();
        stored.version = record.version + 1;
        stored.updated_at = Utc::now();
        let result = self
            .reviews()
            .replace_one(
                doc! { "resource_id": &record.resource_id, "version": record.version },
                &stored,
                None,
            )
            .await
            .map_err(backend)?;
        if result.matched_count == 1 {
            return Ok(stored);
        }
        match self.find_review(&record.resource_id).await? {
            Some(_) => Err(StoreError::Conflict),
            None => Err(StoreError::NotFound),
        }
    }
}
