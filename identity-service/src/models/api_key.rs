//! API key model - opaque long-lived credentials with snapshotted scopes.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Permission;

/// Visible prefix length of the plaintext key, kept for display.
const PREFIX_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    Active,
    Revoked,
    Expired,
}

/// Request ceilings at the two tracked granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RateCeiling {
    pub per_minute: u32,
    pub per_day: u32,
}

/// Stored API key. The plaintext is never persisted; only its SHA-256 hash
/// and a display prefix. Scopes are a snapshot taken at issuance - revoking
/// a capability later does not narrow an already-issued key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    #[serde(rename = "_id")]
    pub id: String,

    pub identity_id: String,

    pub name: String,

    /// SHA-256 hex digest of the plaintext key.
    pub key_hash: String,

    /// First characters of the plaintext, for display only.
    pub prefix: String,

    /// Permission snapshot derived from the identity at issuance time.
    pub scopes: Vec<Permission>,

    pub status: ApiKeyStatus,

    pub expires_at: DateTime<Utc>,

    pub rate_limit: RateCeiling,

    pub last_used_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Build a key record around an already-generated plaintext.
    pub fn new(
        identity_id: String,
        name: String,
        plaintext: &str,
        scopes: Vec<Permission>,
        expires_at: DateTime<Utc>,
        rate_limit: RateCeiling,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identity_id,
            name,
            key_hash: Self::hash_key(plaintext),
            prefix: plaintext.chars().take(PREFIX_LEN).collect(),
            scopes,
            status: ApiKeyStatus::Active,
            expires_at,
            rate_limit,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    /// Generate high-entropy plaintext key material.
    pub fn generate_plaintext() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        format!(
            "pk_{}",
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
        )
    }

    /// Hash a plaintext key using SHA-256.
    pub fn hash_key(plaintext: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(plaintext.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Convert to sanitized response (hash withheld, prefix only).
    pub fn sanitized(&self) -> ApiKeyResponse {
        ApiKeyResponse {
            id: self.id.clone(),
            name: self.name.clone(),
            prefix: self.prefix.clone(),
            scopes: self.scopes.clone(),
            status: self.status,
            expires_at: self.expires_at,
            rate_limit: self.rate_limit,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
        }
    }
}

/// API key response for API (never includes hash or plaintext).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiKeyResponse {
    pub id: String,
    pub name: String,
    pub prefix: String,
    pub scopes: Vec<Permission>,
    pub status: ApiKeyStatus,
    pub expires_at: DateTime<Utc>,
    pub rate_limit: RateCeiling,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
