//! JWT issuance and verification (HS256).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use platform_core::error::{AppError, AuthFailure};

use crate::config::JwtConfig;
use crate::models::{Actor, BaseRole, Capability, Identity};

/// Claims of a short-lived access token. Role and capabilities are baked in
/// at issuance; verification is purely cryptographic, so a grant made after
/// issuance only shows up once the token is refreshed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessTokenClaims {
    /// Identity id.
    pub sub: String,
    pub email: String,
    pub role: BaseRole,
    #[serde(default)]
    pub caps: Vec<Capability>,
    pub iat: i64,
    pub exp: i64,
    /// Token id, unique per issuance.
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.sub.clone(),
            email: self.email.clone(),
            base_role: Some(self.role),
            capabilities: self.caps.clone(),
        }
    }
}

/// Claims of a refresh token. Carries only the chain linkage; authorization
/// state is re-read from the identity record at refresh time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    /// Token family id.
    pub fam: String,
    /// Refresh token id within the family chain.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token pair returned by login and refresh.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_expiry_minutes: i64,
    refresh_expiry_days: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.signing_secret.as_bytes()),
            access_expiry_minutes: config.access_token_expiry_minutes,
            refresh_expiry_days: config.refresh_token_expiry_days,
        }
    }

    pub fn refresh_expiry_days(&self) -> i64 {
        self.refresh_expiry_days
    }

    pub fn access_expiry_seconds(&self) -> i64 {
        self.access_expiry_minutes * 60
    }

    /// Sign an access token for an identity. Callers guarantee the identity
    /// is active and holds a role.
    pub fn sign_access_token(&self, identity: &Identity, role: BaseRole) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: identity.id.clone(),
            email: identity.email.clone(),
            role,
            caps: identity.capabilities.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.access_expiry_minutes)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("access token signing failed: {}", e)))
    }

    /// Sign a refresh token bound to one position in a family chain.
    pub fn sign_refresh_token(
        &self,
        identity_id: &str,
        family_id: &str,
        token_id: &str,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = RefreshTokenClaims {
            sub: identity_id.to_string(),
            fam: family_id.to_string(),
            jti: token_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(self.refresh_expiry_days)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("refresh token signing failed: {}", e)))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, AppError> {
        decode::<AccessTokenClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, AppError> {
        decode::<RefreshTokenClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AppError {
    use jsonwebtoken::errors::ErrorKind;
    let failure = match err.kind() {
        ErrorKind::ExpiredSignature => AuthFailure::Expired,
        ErrorKind::InvalidSignature => AuthFailure::BadSignature,
        _ => AuthFailure::Malformed,
    };
    AppError::AuthenticationFailed(failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;

    fn service(secret: &str) -> JwtService {
        JwtService::new(&JwtConfig {
            signing_secret: secret.to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        })
    }

    fn identity() -> Identity {
        let mut identity = Identity::new("sub-1".into(), "a@example.com".into(), None);
        identity.assign_role(BaseRole::Curator);
        identity.grant_capabilities(&[Capability::AgentAccess]);
        identity
    }

    #[test]
    fn access_token_round_trips_claims() {
        let svc = service("test-secret");
        let identity = identity();
        let token = svc.sign_access_token(&identity, BaseRole::Curator).unwrap();
        let claims = svc.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, identity.id);
        assert_eq!(claims.role, BaseRole::Curator);
        assert_eq!(claims.caps, vec![Capability::AgentAccess]);
    }

    #[test]
    fn wrong_secret_is_a_bad_signature() {
        let token = service("secret-a")
            .sign_access_token(&identity(), BaseRole::Curator)
            .unwrap();
        match service("secret-b").verify_access_token(&token) {
            Err(AppError::AuthenticationFailed(AuthFailure::BadSignature)) => {}
            other => panic!("unexpected: {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = JwtService::new(&JwtConfig {
            signing_secret: "test-secret".to_string(),
            access_token_expiry_minutes: -5,
            refresh_token_expiry_days: 7,
        });
        let token = svc.sign_access_token(&identity(), BaseRole::Curator).unwrap();
        match svc.verify_access_token(&token) {
            Err(AppError::AuthenticationFailed(AuthFailure::Expired)) => {}
            other => panic!("unexpected: {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn garbage_is_malformed() {
        match service("test-secret").verify_access_token("not-a-jwt") {
            Err(AppError::AuthenticationFailed(AuthFailure::Malformed)) => {}
            other => panic!("unexpected: {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn refresh_token_carries_family_linkage() {
        let svc = service("test-secret");
        let token = svc.sign_refresh_token("id-1", "fam-1", "tok-1").unwrap();
        let claims = svc.verify_refresh_token(&token).unwrap();
        assert_eq!(claims.sub, "id-1");
        assert_eq!(claims.fam, "fam-1");
        assert_eq!(claims.jti, "tok-1");
    }
}
