//! Login via the external identity provider, plus administrator identity
//! management (approval and suspension).

use std::sync::Arc;

use chrono::Utc;

use platform_core::error::AppError;

use crate::models::{
    Actor, AuditEntry, AuthMethod, BaseRole, ClientMeta, Identity, IdentityStatus,
};
use crate::services::audit::{AuditLogger, COMPONENT_IDENTITY};
use crate::services::jwt::TokenResponse;
use crate::services::provider::IdentityProvider;
use crate::services::token::TokenService;
use crate::store::CredentialStore;

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn IdentityProvider>,
    tokens: TokenService,
    audit: AuditLogger,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn IdentityProvider>,
        tokens: TokenService,
        audit: AuditLogger,
    ) -> Self {
        Self {
            store,
            provider,
            tokens,
            audit,
        }
    }

    /// Exchange a provider authorization code for a token pair. First login
    /// creates the identity in `pending_approval` with no role; tokens are
    /// only issued once an administrator has activated the account. The
    /// provider exchange happens before any write, so a failed exchange
    /// leaves nothing behind.
    pub async fn login(&self, code: &str, meta: &ClientMeta) -> Result<TokenResponse, AppError> {
        let profile = self.provider.exchange_code(code).await?;

        let identity = match self
            .store
            .find_identity_by_subject(&profile.subject)
            .await?
        {
            Some(identity) => identity,
            None => {
                let identity = Identity::new(
                    profile.subject.clone(),
                    profile.email.clone(),
                    profile.display_name.clone(),
                );
                self.store.insert_identity(&identity).await?;
                self.audit.record(
                    AuditEntry::new(
                        identity.id.clone(),
                        "identity.create",
                        COMPONENT_IDENTITY,
                        AuthMethod::System,
                    )
                    .with_resource("identity", identity.id.clone())
                    .with_client(meta),
                );
                identity
            }
        };

        match identity.status {
            IdentityStatus::PendingApproval => {
                return Err(AppError::AuthorizationDenied(
                    "account awaiting administrator approval".to_string(),
                ))
            }
            IdentityStatus::Suspended => {
                return Err(AppError::AuthorizationDenied(
                    "account suspended".to_string(),
                ))
            }
            IdentityStatus::Active => {}
        }

        self.store.record_login(&identity.id, Utc::now()).await?;
        let pair = self.tokens.issue(&identity).await?;

        self.audit.record(
            AuditEntry::new(
                identity.id.clone(),
                "auth.login",
                COMPONENT_IDENTITY,
                AuthMethod::AccessToken,
            )
            .with_client(meta),
        );
        Ok(pair)
    }

    /// Activate a pending identity with a base role.
    pub async fn approve_identity(
        &self,
        admin: &Actor,
        identity_id: &str,
        role: BaseRole,
        meta: &ClientMeta,
    ) -> Result<Identity, AppError> {
        let mut identity = self.load(identity_id).await?;
        identity.assign_role(role);
        identity.status = IdentityStatus::Active;
        self.store.update_identity(&identity).await?;

        self.audit.record(
            AuditEntry::new(
                admin.id.clone(),
                "identity.approve",
                COMPONENT_IDENTITY,
                AuthMethod::AccessToken,
            )
            .with_resource("identity", identity.id.clone())
            .with_detail(serde_json::json!({ "role": role }))
            .with_client(meta),
        );
        Ok(identity)
    }

    /// Suspend an identity and close every open session. Suspension is the
    /// only removal path; identities are never hard-deleted.
    pub async fn suspend_identity(
        &self,
        admin: &Actor,
        identity_id: &str,
        meta: &ClientMeta,
    ) -> Result<Identity, AppError> {
        if admin.id == identity_id {
            return Err(AppError::AuthorizationDenied(
                "cannot suspend your own account".to_string(),
            ));
        }
        let mut identity = self.load(identity_id).await?;
        identity.status = IdentityStatus::Suspended;
        identity.updated_at = Utc::now();
        self.store.update_identity(&identity).await?;

        let revoked_sessions = self.tokens.revoke_all_for_identity(identity_id).await?;

        self.audit.record(
            AuditEntry::new(
                admin.id.clone(),
                "identity.suspend",
                COMPONENT_IDENTITY,
                AuthMethod::AccessToken,
            )
            .with_resource("identity", identity.id.clone())
            .with_detail(serde_json::json!({ "revoked_sessions": revoked_sessions }))
            .with_client(meta),
        );
        Ok(identity)
    }

    pub async fn get_identity(&self, identity_id: &str) -> Result<Identity, AppError> {
        self.load(identity_id).await
    }

    async fn load(&self, identity_id: &str) -> Result<Identity, AppError> {
        self.store
            .find_identity(identity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("identity".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::services::jwt::JwtService;
    use crate::services::provider::StubProvider;
    use crate::store::MemoryStore;

    fn fixture() -> (Arc<MemoryStore>, AuthService) {
        let store = Arc::new(MemoryStore::new());
        let jwt = JwtService::new(&JwtConfig {
            signing_secret: "test-secret".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        });
        let audit = AuditLogger::new(store.clone());
        let tokens = TokenService::new(store.clone(), jwt, audit.clone());
        let auth = AuthService::new(store.clone(), Arc::new(StubProvider), tokens, audit);
        (store, auth)
    }

    fn admin() -> Actor {
        Actor {
            id: "admin-1".into(),
            email: "root@example.com".into(),
            base_role: Some(BaseRole::Administrator),
            capabilities: vec![],
        }
    }

    #[tokio::test]
    async fn first_login_creates_a_pending_identity_without_tokens() {
        let (store, auth) = fixture();
        let err = auth
            .login("code:sub-1:a@example.com", &ClientMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthorizationDenied(_)));

        let identity = store
            .find_identity_by_subject("sub-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.status, IdentityStatus::PendingApproval);
        assert!(identity.base_role.is_none());
        assert_eq!(identity.login_count, 0);
    }

    #[tokio::test]
    async fn approved_identity_logs_in_and_counts_logins() {
        let (store, auth) = fixture();
        let _ = auth
            .login("code:sub-1:a@example.com", &ClientMeta::default())
            .await;
        let identity = store
            .find_identity_by_subject("sub-1")
            .await
            .unwrap()
            .unwrap();

        auth.approve_identity(
            &admin(),
            &identity.id,
            BaseRole::Curator,
            &ClientMeta::default(),
        )
        .await
        .unwrap();

        let pair = auth
            .login("code:sub-1:a@example.com", &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(pair.token_type, "Bearer");

        let updated = store.find_identity(&identity.id).await.unwrap().unwrap();
        assert_eq!(updated.login_count, 1);
        assert!(updated.last_login_at.is_some());
    }

    #[tokio::test]
    async fn bad_provider_code_persists_nothing() {
        let (store, auth) = fixture();
        assert!(auth
            .login("garbage", &ClientMeta::default())
            .await
            .is_err());
        assert!(store
            .find_identity_by_subject("sub-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn suspension_blocks_login_and_closes_sessions() {
        let (store, auth) = fixture();
        let _ = auth
            .login("code:sub-1:a@example.com", &ClientMeta::default())
            .await;
        let identity = store
            .find_identity_by_subject("sub-1")
            .await
            .unwrap()
            .unwrap();
        auth.approve_identity(
            &admin(),
            &identity.id,
            BaseRole::Curator,
            &ClientMeta::default(),
        )
        .await
        .unwrap();
        auth.login("code:sub-1:a@example.com", &ClientMeta::default())
            .await
            .unwrap();

        auth.suspend_identity(&admin(), &identity.id, &ClientMeta::default())
            .await
            .unwrap();
        assert!(matches!(
            auth.login("code:sub-1:a@example.com", &ClientMeta::default())
                .await,
            Err(AppError::AuthorizationDenied(_))
        ));
    }

    #[tokio::test]
    async fn admins_cannot_suspend_themselves() {
        let (store, auth) = fixture();
        let mut identity = Identity::new("sub-9".into(), "root@example.com".into(), None);
        identity.assign_role(BaseRole::Administrator);
        store.insert_identity(&identity).await.unwrap();

        let err = auth
            .suspend_identity(&identity.actor(), &identity.id, &ClientMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthorizationDenied(_)));
    }
}
