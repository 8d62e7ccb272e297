//! Bearer-credential authentication middleware. Accepts either a signed
//! access token or an opaque API key in the Authorization header and
//! resolves both to the same `AuthContext`.

use std::collections::BTreeSet;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
    Extension,
};

use platform_core::error::{AppError, AuthFailure};

use crate::models::{Actor, AuthMethod, Permission, RateCeiling};
use crate::services::{permissions, rate_limit::ceiling_for_actor};
use crate::AppState;

/// Everything downstream layers need to know about the caller.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub actor: Actor,
    /// Effective permissions: resolved live for token calls, the issuance
    /// snapshot for API-key calls.
    pub permissions: BTreeSet<Permission>,
    pub auth_method: AuthMethod,
    /// Rate-limiter bucket (identity id for tokens, key id for API keys).
    pub rate_key: String,
    pub ceiling: RateCeiling,
}

impl AuthContext {
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(AppError::missing_permission(permission))
        }
    }

    /// Ownership check with an administrator override.
    pub fn require_self_or_admin(&self, identity_id: &str) -> Result<(), AppError> {
        if self.actor.id == identity_id || self.actor.is_admin() {
            Ok(())
        } else {
            Err(AppError::AuthorizationDenied(
                "not your resource".to_string(),
            ))
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let credential = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::AuthenticationFailed(
            AuthFailure::MissingCredential,
        ))?;

    let context = if credential.starts_with("pk_") {
        let (identity, key) = state.api_keys.validate(credential).await?;
        AuthContext {
            actor: identity.actor(),
            permissions: key.scopes.iter().copied().collect(),
            auth_method: AuthMethod::ApiKey,
            rate_key: key.id.clone(),
            ceiling: key.rate_limit,
        }
    } else {
        let claims = state.tokens.verify_access(credential)?;
        let actor = claims.actor();
        let permissions = permissions::effective_permissions(&actor);
        let ceiling = ceiling_for_actor(&actor, &state.config.rate_limits);
        AuthContext {
            rate_key: actor.id.clone(),
            actor,
            permissions,
            auth_method: AuthMethod::AccessToken,
            ceiling,
        }
    };

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// Extractor handing handlers the resolved caller context.
pub struct AuthUser(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(context) = Extension::<AuthContext>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::AuthenticationFailed(AuthFailure::MissingCredential))?;
        Ok(AuthUser(context))
    }
}
