//! Token lifecycle: issuance at login, refresh rotation with reuse
//! detection, and revocation.
//!
//! Access tokens are verified purely cryptographically and are never
//! revocable individually; revocation acts on refresh-token families, so
//! the access-token expiry bounds how long a revoked session lingers.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use platform_core::error::{AppError, AuthFailure};

use crate::models::{AuditEntry, AuthMethod, ClientMeta, Identity, TokenFamily};
use crate::services::audit::{AuditLogger, COMPONENT_IDENTITY};
use crate::services::jwt::{AccessTokenClaims, JwtService, TokenResponse};
use crate::store::{AdvanceOutcome, CredentialStore};

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn CredentialStore>,
    jwt: JwtService,
    audit: AuditLogger,
}

impl TokenService {
    pub fn new(store: Arc<dyn CredentialStore>, jwt: JwtService, audit: AuditLogger) -> Self {
        Self { store, jwt, audit }
    }

    /// Mint a fresh token pair and a new refresh family for an identity.
    /// Callers guarantee the identity is active with an assigned role.
    pub async fn issue(&self, identity: &Identity) -> Result<TokenResponse, AppError> {
        let role = identity
            .base_role
            .ok_or_else(|| AppError::AuthorizationDenied("no role assigned".to_string()))?;

        let first_token_id = Uuid::new_v4().to_string();
        let family = TokenFamily::new(
            identity.id.clone(),
            first_token_id.clone(),
            self.jwt.refresh_expiry_days(),
        );
        self.store.insert_family(&family).await?;

        let access_token = self.jwt.sign_access_token(identity, role)?;
        let refresh_token =
            self.jwt
                .sign_refresh_token(&identity.id, &family.id, &first_token_id)?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_expiry_seconds(),
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessTokenClaims, AppError> {
        self.jwt.verify_access_token(token)
    }

    /// Rotate a refresh token. Exactly one concurrent caller presenting the
    /// current token id wins; everyone else sees a reuse, which revokes the
    /// whole family.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        meta: &ClientMeta,
    ) -> Result<TokenResponse, AppError> {
        let claims = self.jwt.verify_refresh_token(refresh_token)?;
        let next_token_id = Uuid::new_v4().to_string();

        let outcome = self
            .store
            .advance_family(&claims.fam, &claims.jti, &next_token_id, Utc::now())
            .await?;

        let family = match outcome {
            AdvanceOutcome::Advanced(family) => family,
            AdvanceOutcome::Reused => {
                // Theft signal. The store already revoked the family; make
                // sure the event is durably recorded before failing.
                self.audit
                    .record_sync(
                        AuditEntry::new(
                            claims.sub.clone(),
                            "auth.refresh_reuse_detected",
                            COMPONENT_IDENTITY,
                            AuthMethod::AccessToken,
                        )
                        .with_resource("token_family", claims.fam.clone())
                        .with_client(meta),
                    )
                    .await?;
                tracing::warn!(
                    identity_id = %claims.sub,
                    family_id = %claims.fam,
                    "refresh token reuse detected, family revoked"
                );
                return Err(AppError::AuthenticationFailed(AuthFailure::Reused));
            }
            AdvanceOutcome::Revoked => {
                return Err(AppError::AuthenticationFailed(AuthFailure::Revoked))
            }
            AdvanceOutcome::Unknown | AdvanceOutcome::NotFound => {
                return Err(AppError::AuthenticationFailed(AuthFailure::NotFound))
            }
        };

        if family.is_expired() {
            self.store.revoke_family(&family.id).await?;
            return Err(AppError::AuthenticationFailed(AuthFailure::Expired));
        }

        // Re-read the identity so role or capability changes made since the
        // last rotation land in the new access token.
        let identity = self
            .store
            .find_identity(&claims.sub)
            .await?
            .ok_or(AppError::AuthenticationFailed(AuthFailure::NotFound))?;
        if !identity.is_active() {
            self.store.revoke_family(&family.id).await?;
            return Err(AppError::AuthenticationFailed(AuthFailure::Revoked));
        }
        let role = identity
            .base_role
            .ok_or(AppError::AuthenticationFailed(AuthFailure::Revoked))?;

        let access_token = self.jwt.sign_access_token(&identity, role)?;
        let new_refresh =
            self.jwt
                .sign_refresh_token(&identity.id, &family.id, &next_token_id)?;

        Ok(TokenResponse {
            access_token,
            refresh_token: new_refresh,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_expiry_seconds(),
        })
    }

    /// Revoke the family behind a refresh token. Expired or already-revoked
    /// tokens still verify structurally, so logout stays idempotent.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AppError> {
        let claims = self.jwt.verify_refresh_token(refresh_token)?;
        self.store.revoke_family(&claims.fam).await?;
        Ok(())
    }

    /// Revoke every open session of an identity, returning the count.
    pub async fn revoke_all_for_identity(&self, identity_id: &str) -> Result<u64, AppError> {
        Ok(self.store.revoke_families_for_identity(identity_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::models::{AuditQuery, BaseRole, IdentityStatus};
    use crate::store::MemoryStore;

    fn fixture() -> (Arc<MemoryStore>, TokenService) {
        let store = Arc::new(MemoryStore::new());
        let jwt = JwtService::new(&JwtConfig {
            signing_secret: "test-secret".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        });
        let audit = AuditLogger::new(store.clone());
        let service = TokenService::new(store.clone(), jwt, audit);
        (store, service)
    }

    async fn active_identity(store: &MemoryStore) -> Identity {
        let mut identity = Identity::new("sub-1".into(), "a@example.com".into(), None);
        identity.assign_role(BaseRole::Curator);
        store.insert_identity(&identity).await.unwrap();
        identity
    }

    #[tokio::test]
    async fn refresh_rotates_and_old_token_becomes_reuse() {
        let (store, service) = fixture();
        let identity = active_identity(&store).await;
        let pair = service.issue(&identity).await.unwrap();

        let rotated = service
            .refresh(&pair.refresh_token, &ClientMeta::default())
            .await
            .unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        // Presenting the consumed token again is a theft signal.
        match service
            .refresh(&pair.refresh_token, &ClientMeta::default())
            .await
        {
            Err(AppError::AuthenticationFailed(AuthFailure::Reused)) => {}
            other => panic!("unexpected: {:?}", other.map(|t| t.token_type)),
        }

        // And the revocation takes the rotated token down with it.
        match service
            .refresh(&rotated.refresh_token, &ClientMeta::default())
            .await
        {
            Err(AppError::AuthenticationFailed(AuthFailure::Revoked)) => {}
            other => panic!("unexpected: {:?}", other.map(|t| t.token_type)),
        }
    }

    #[tokio::test]
    async fn reuse_is_audited() {
        let (store, service) = fixture();
        let identity = active_identity(&store).await;
        let pair = service.issue(&identity).await.unwrap();
        service
            .refresh(&pair.refresh_token, &ClientMeta::default())
            .await
            .unwrap();
        let _ = service
            .refresh(&pair.refresh_token, &ClientMeta::default())
            .await;

        let entries = store
            .query_audit(&AuditQuery {
                action: Some("auth.refresh_reuse_detected".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor_id, identity.id);
    }

    #[tokio::test]
    async fn suspended_identity_cannot_refresh() {
        let (store, service) = fixture();
        let mut identity = active_identity(&store).await;
        let pair = service.issue(&identity).await.unwrap();

        identity.status = IdentityStatus::Suspended;
        store.update_identity(&identity).await.unwrap();

        match service
            .refresh(&pair.refresh_token, &ClientMeta::default())
            .await
        {
            Err(AppError::AuthenticationFailed(AuthFailure::Revoked)) => {}
            other => panic!("unexpected: {:?}", other.map(|t| t.token_type)),
        }
    }

    #[tokio::test]
    async fn revoke_all_closes_every_session() {
        let (store, service) = fixture();
        let identity = active_identity(&store).await;
        let a = service.issue(&identity).await.unwrap();
        let b = service.issue(&identity).await.unwrap();

        let revoked = service.revoke_all_for_identity(&identity.id).await.unwrap();
        assert_eq!(revoked, 2);

        for pair in [a, b] {
            match service
                .refresh(&pair.refresh_token, &ClientMeta::default())
                .await
            {
                Err(AppError::AuthenticationFailed(AuthFailure::Revoked)) => {}
                other => panic!("unexpected: {:?}", other.map(|t| t.token_type)),
            }
        }
    }

    #[tokio::test]
    async fn logout_revokes_the_family() {
        let (store, service) = fixture();
        let identity = active_identity(&store).await;
        let pair = service.issue(&identity).await.unwrap();

        service.revoke(&pair.refresh_token).await.unwrap();
        match service
            .refresh(&pair.refresh_token, &ClientMeta::default())
            .await
        {
            Err(AppError::AuthenticationFailed(AuthFailure::Revoked)) => {}
            other => panic!("unexpected: {:?}", other.map(|t| t.token_type)),
        }
    }
}
