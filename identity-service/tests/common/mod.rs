//! Shared test harness: the full router over an in-memory store and a
//! stubbed identity provider.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use identity_service::config::{
    Environment, IdentityConfig, JwtConfig, MongoConfig, ProviderConfig, RateLimitConfig,
    ServerConfig,
};
use identity_service::models::{BaseRole, Capability, Identity, RateCeiling};
use identity_service::services::StubProvider;
use identity_service::store::MemoryStore;
use identity_service::{build_router, build_state, AppState};

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

pub fn test_config() -> IdentityConfig {
    IdentityConfig {
        environment: Environment::Development,
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        },
        mongo: MongoConfig {
            uri: "mongodb://unused".into(),
            database: "unused".into(),
        },
        jwt: JwtConfig {
            signing_secret: "integration-test-secret".into(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        provider: ProviderConfig {
            token_url: "http://unused".into(),
            client_id: "unused".into(),
            client_secret: "unused".into(),
            timeout_seconds: 1,
        },
        rate_limits: RateLimitConfig {
            administrator: RateCeiling {
                per_minute: 600,
                per_day: 500_000,
            },
            curator: RateCeiling {
                per_minute: 240,
                per_day: 100_000,
            },
            explorator: RateCeiling {
                per_minute: 60,
                per_day: 10_000,
            },
        },
        log_level: "warn".into(),
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with_config(test_config())
}

pub fn spawn_app_with_config(config: IdentityConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = build_state(config, store.clone(), store.clone(), Arc::new(StubProvider));
    TestApp {
        router: build_router(state.clone()),
        store,
        state,
    }
}

impl TestApp {
    /// Seed an active identity and return it.
    pub async fn seed_identity(
        &self,
        subject: &str,
        email: &str,
        role: BaseRole,
        capabilities: &[Capability],
    ) -> Identity {
        use identity_service::store::CredentialStore;
        let mut identity = Identity::new(subject.to_string(), email.to_string(), None);
        identity.assign_role(role);
        identity.grant_capabilities(capabilities);
        self.store.insert_identity(&identity).await.unwrap();
        identity
    }

    /// Log a seeded identity in through the stub provider.
    pub async fn login(&self, subject: &str, email: &str) -> Value {
        let (status, body) = self
            .post_json(
                "/auth/login",
                None,
                serde_json::json!({ "code": format!("code:{}:{}", subject, email) }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(build_request("GET", uri, token, None)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(build_request("DELETE", uri, token, None)).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send(build_request("POST", uri, token, Some(body)))
            .await
    }
}

fn build_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Pull a string field out of a JSON body.
pub fn field<'a>(body: &'a Value, name: &str) -> &'a str {
    body.get(name)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing field {} in {}", name, body))
}
