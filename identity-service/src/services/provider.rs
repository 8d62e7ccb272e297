//! External identity provider integration. Login starts with a provider
//! authorization code; we exchange it for the subject profile and never
//! handle passwords ourselves.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use platform_core::error::{AppError, AuthFailure};

use crate::config::ProviderConfig;

/// Profile the provider vouches for after a successful code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    pub subject: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange an authorization code for the authenticated profile.
    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, AppError>;
}

pub struct HttpIdentityProvider {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(anyhow::anyhow!("provider client build failed: {}", e)))?;
        Ok(Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, AppError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("provider unreachable: {}", e)))?;

        if response.status().is_client_error() {
            // The provider refused the code; the caller's credential is bad.
            return Err(AppError::AuthenticationFailed(AuthFailure::NotFound));
        }
        if !response.status().is_success() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "provider returned {}",
                response.status()
            )));
        }

        response
            .json::<ProviderProfile>()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("provider response malformed: {}", e)))
    }
}

/// Deterministic in-process provider for tests: accepts codes of the form
/// `code:<subject>:<email>` and rejects everything else.
pub struct StubProvider;

#[async_trait]
impl IdentityProvider for StubProvider {
    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, AppError> {
        let mut parts = code.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("code"), Some(subject), Some(email)) => Ok(ProviderProfile {
                subject: subject.to_string(),
                email: email.to_string(),
                display_name: None,
            }),
            _ => Err(AppError::AuthenticationFailed(AuthFailure::NotFound)),
        }
    }
}
