//! Token family model - the rotating refresh-token chain of one login session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One refresh-token family per login session. Exactly one unused refresh
/// token id (`current_token_id`) exists at any time; presenting a superseded
/// id is treated as a theft signal and revokes the whole family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenFamily {
    #[serde(rename = "_id")]
    pub id: String,

    pub identity_id: String,

    /// The single refresh token id that is currently valid.
    pub current_token_id: String,

    /// Ids already consumed by rotation, oldest first.
    #[serde(default)]
    pub issued_token_ids: Vec<String>,

    #[serde(default)]
    pub revoked: bool,

    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    pub refreshed_at: DateTime<Utc>,
}

impl TokenFamily {
    /// Mint a new family at login.
    pub fn new(identity_id: String, first_token_id: String, expires_in_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            identity_id,
            current_token_id: first_token_id,
            issued_token_ids: Vec::new(),
            revoked: false,
            expires_at: now + Duration::days(expires_in_days),
            created_at: now,
            refreshed_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.revoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_family_is_valid() {
        let family = TokenFamily::new("identity-1".into(), "token-1".into(), 7);
        assert_eq!(family.current_token_id, "token-1");
        assert!(family.issued_token_ids.is_empty());
        assert!(!family.revoked);
        assert!(family.is_valid());
    }

    #[test]
    fn expired_family_is_invalid() {
        let mut family = TokenFamily::new("identity-1".into(), "token-1".into(), 7);
        family.expires_at = Utc::now() - Duration::seconds(1);
        assert!(family.is_expired());
        assert!(!family.is_valid());
    }

    #[test]
    fn revoked_family_is_invalid() {
        let mut family = TokenFamily::new("identity-1".into(), "token-1".into(), 7);
        family.revoked = true;
        assert!(!family.is_valid());
    }
}
