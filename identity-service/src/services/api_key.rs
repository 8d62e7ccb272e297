//! API key issuance, validation, and lifecycle.

use std::sync::Arc;

use chrono::{Duration, Utc};

use platform_core::error::{AppError, AuthFailure};

use crate::models::{
    Actor, ApiKey, ApiKeyStatus, BaseRole, Capability, Identity, RateCeiling,
};
use crate::services::permissions;
use crate::store::CredentialStore;

/// Issuance terms derived from the identity's tier at creation time.
#[derive(Debug, Clone, Copy)]
pub struct IssuanceTerms {
    pub expiry_days: i64,
    pub rate_limit: RateCeiling,
}

/// Tier table. Analytics-capable curators sit between base curators and
/// administrators; explorators get the shortest and lowest terms.
pub fn issuance_terms(identity: &Identity) -> Result<IssuanceTerms, AppError> {
    let role = identity
        .base_role
        .ok_or_else(|| AppError::AuthorizationDenied("no role assigned".to_string()))?;
    Ok(match role {
        BaseRole::Administrator => IssuanceTerms {
            expiry_days: 365,
            rate_limit: RateCeiling {
                per_minute: 600,
                per_day: 500_000,
            },
        },
        BaseRole::Curator if identity.capabilities.contains(&Capability::AnalyticsAccess) => {
            IssuanceTerms {
                expiry_days: 365,
                rate_limit: RateCeiling {
                    per_minute: 240,
                    per_day: 100_000,
                },
            }
        }
        BaseRole::Curator => IssuanceTerms {
            expiry_days: 90,
            rate_limit: RateCeiling {
                per_minute: 120,
                per_day: 20_000,
            },
        },
        BaseRole::Explorator => IssuanceTerms {
            expiry_days: 30,
            rate_limit: RateCeiling {
                per_minute: 30,
                per_day: 2_000,
            },
        },
    })
}

#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn CredentialStore>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Issue a key for an identity. The plaintext is returned exactly once;
    /// only its hash and display prefix are persisted. Scopes are the
    /// identity's effective permissions frozen at this moment.
    pub async fn issue(
        &self,
        identity: &Identity,
        name: &str,
    ) -> Result<(ApiKey, String), AppError> {
        if !identity.is_active() {
            return Err(AppError::AuthorizationDenied(
                "identity is not active".to_string(),
            ));
        }
        let terms = issuance_terms(identity)?;
        let scopes = permissions::effective_permissions(&identity.actor())
            .into_iter()
            .collect();

        let plaintext = ApiKey::generate_plaintext();
        let key = ApiKey::new(
            identity.id.clone(),
            name.to_string(),
            &plaintext,
            scopes,
            Utc::now() + Duration::days(terms.expiry_days),
            terms.rate_limit,
        );
        self.store.insert_api_key(&key).await?;
        Ok((key, plaintext))
    }

    /// Authenticate a plaintext key. Expiry is discovered lazily: the first
    /// call past `expires_at` flips the stored status and fails, and every
    /// later call fails on the stored status.
    pub async fn validate(&self, plaintext: &str) -> Result<(Identity, ApiKey), AppError> {
        let hash = ApiKey::hash_key(plaintext);
        let key = self
            .store
            .find_api_key_by_hash(&hash)
            .await?
            .ok_or(AppError::AuthenticationFailed(AuthFailure::NotFound))?;

        match key.status {
            ApiKeyStatus::Revoked => {
                return Err(AppError::AuthenticationFailed(AuthFailure::Revoked))
            }
            ApiKeyStatus::Expired => {
                return Err(AppError::AuthenticationFailed(AuthFailure::Expired))
            }
            ApiKeyStatus::Active => {}
        }

        let now = Utc::now();
        if key.is_expired(now) {
            // Losing this swap is benign; either way the key is expired.
            self.store
                .set_api_key_status(&key.id, ApiKeyStatus::Active, ApiKeyStatus::Expired)
                .await?;
            return Err(AppError::AuthenticationFailed(AuthFailure::Expired));
        }

        let identity = self
            .store
            .find_identity(&key.identity_id)
            .await?
            .ok_or(AppError::AuthenticationFailed(AuthFailure::NotFound))?;
        if !identity.is_active() {
            return Err(AppError::AuthenticationFailed(AuthFailure::Revoked));
        }

        self.store.touch_api_key(&key.id, now).await?;
        Ok((identity, key))
    }

    /// Revoke a key. Only the owner or an administrator may revoke.
    pub async fn revoke(&self, actor: &Actor, key_id: &str) -> Result<ApiKey, AppError> {
        let key = self.load_owned(actor, key_id).await?;
        let flipped = self
            .store
            .set_api_key_status(&key.id, ApiKeyStatus::Active, ApiKeyStatus::Revoked)
            .await?;
        if !flipped {
            return Err(AppError::WorkflowConflict("key is not active".to_string()));
        }
        self.store
            .find_api_key(&key.id)
            .await?
            .ok_or_else(|| AppError::NotFound("api key".to_string()))
    }

    /// Revoke a key and issue a replacement carrying the same name, scope
    /// snapshot, rate ceiling, and lifetime.
    pub async fn regenerate(
        &self,
        actor: &Actor,
        key_id: &str,
    ) -> Result<(ApiKey, String), AppError> {
        let old = self.load_owned(actor, key_id).await?;
        let flipped = self
            .store
            .set_api_key_status(&old.id, ApiKeyStatus::Active, ApiKeyStatus::Revoked)
            .await?;
        if !flipped {
            return Err(AppError::WorkflowConflict("key is not active".to_string()));
        }

        let lifetime = old.expires_at - old.created_at;
        let plaintext = ApiKey::generate_plaintext();
        let replacement = ApiKey::new(
            old.identity_id.clone(),
            old.name.clone(),
            &plaintext,
            old.scopes.clone(),
            Utc::now() + lifetime,
            old.rate_limit,
        );
        self.store.insert_api_key(&replacement).await?;
        Ok((replacement, plaintext))
    }

    pub async fn list(&self, identity_id: &str) -> Result<Vec<ApiKey>, AppError> {
        Ok(self.store.list_api_keys(identity_id).await?)
    }

    async fn load_owned(&self, actor: &Actor, key_id: &str) -> Result<ApiKey, AppError> {
        let key = self
            .store
            .find_api_key(key_id)
            .await?
            .ok_or_else(|| AppError::NotFound("api key".to_string()))?;
        if key.identity_id != actor.id && !actor.is_admin() {
            return Err(AppError::AuthorizationDenied(
                "not the key owner".to_string(),
            ));
        }
        Ok(key)
    }
}
