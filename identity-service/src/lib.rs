pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use platform_core::error::AppError;

use crate::config::IdentityConfig;
use crate::services::{
    ApiKeyService, AuditLogger, AuthService, RateLimitService, RequestWorkflow, ReviewWorkflow,
    TokenService,
};
use crate::store::CredentialStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::session::login,
        handlers::session::refresh,
        handlers::session::logout,
        handlers::session::introspect,
        handlers::users::me,
        handlers::keys::create_key,
        handlers::keys::list_keys,
        handlers::keys::revoke_key,
        handlers::keys::regenerate_key,
        handlers::requests::submit_request,
        handlers::requests::list_requests,
        handlers::requests::get_request,
        handlers::requests::approve_request,
        handlers::requests::reject_request,
        handlers::admin::approve_identity,
        handlers::admin::suspend_identity,
        handlers::audit::query_audit,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::LoginRequest,
            dtos::RefreshRequest,
            dtos::LogoutRequest,
            dtos::IntrospectRequest,
            dtos::IntrospectResponse,
            dtos::MeResponse,
            dtos::CreateKeyRequest,
            dtos::KeyCreatedResponse,
            dtos::SubmitRequestDto,
            dtos::DecideRequestDto,
            dtos::ApproveIdentityRequest,
            services::TokenResponse,
            models::ApiKeyResponse,
            models::ApiKeyStatus,
            models::RateCeiling,
            models::AuditEntry,
            models::audit::AuthMethod,
            models::BaseRole,
            models::Capability,
            models::CapabilityRequestResponse,
            models::IdentityResponse,
            models::identity::IdentityStatus,
            models::Permission,
            models::RequestKind,
            models::RequestStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Session", description = "Login and token lifecycle"),
        (name = "Users", description = "Identity self-service"),
        (name = "Keys", description = "API key management"),
        (name = "Requests", description = "Role and capability requests"),
        (name = "Admin", description = "Identity administration"),
        (name = "Audit", description = "Audit trail queries"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IdentityConfig>,
    pub store: Arc<dyn CredentialStore>,
    pub auth: AuthService,
    pub tokens: TokenService,
    pub api_keys: ApiKeyService,
    pub audit: AuditLogger,
    pub rate_limiter: RateLimitService,
    pub requests: RequestWorkflow,
    pub reviews: ReviewWorkflow,
}

pub fn build_router(state: AppState) -> Router {
    // Routes reachable without a credential.
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/auth/login", post(handlers::session::login))
        .route("/auth/refresh", post(handlers::session::refresh))
        .route("/auth/logout", post(handlers::session::logout))
        .route("/auth/introspect", post(handlers::session::introspect));

    // Everything else authenticates first, then passes the rate limiter.
    let protected_routes = Router::new()
        .route("/users/me", get(handlers::users::me))
        .route(
            "/keys",
            post(handlers::keys::create_key).get(handlers::keys::list_keys),
        )
        .route("/keys/:key_id", delete(handlers::keys::revoke_key))
        .route(
            "/keys/:key_id/regenerate",
            post(handlers::keys::regenerate_key),
        )
        .route(
            "/requests",
            post(handlers::requests::submit_request).get(handlers::requests::list_requests),
        )
        .route("/requests/:request_id", get(handlers::requests::get_request))
        .route(
            "/requests/:request_id/approve",
            post(handlers::requests::approve_request),
        )
        .route(
            "/requests/:request_id/reject",
            post(handlers::requests::reject_request),
        )
        .route(
            "/admin/identities/:identity_id/approve",
            post(handlers::admin::approve_identity),
        )
        .route(
            "/admin/identities/:identity_id/suspend",
            post(handlers::admin::suspend_identity),
        )
        .route("/audit", get(handlers::audit::query_audit))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    public_routes
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Service health, including store reachability
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy"),
        (status = 500, description = "Store unreachable", body = dtos::ErrorResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .store
        .health_check()
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("store unreachable: {}", e)))?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// Wire the full service graph over any store pair. Tests hand this an
/// in-memory store; `main` hands it MongoDB.
pub fn build_state(
    config: IdentityConfig,
    store: Arc<dyn CredentialStore>,
    resources: Arc<dyn store::ResourceStore>,
    provider: Arc<dyn services::IdentityProvider>,
) -> AppState {
    let jwt = services::JwtService::new(&config.jwt);
    let audit = AuditLogger::new(store.clone());
    let tokens = TokenService::new(store.clone(), jwt, audit.clone());
    let auth = AuthService::new(store.clone(), provider, tokens.clone(), audit.clone());
    let api_keys = ApiKeyService::new(store.clone());
    let rate_limiter = RateLimitService::new(store.clone());
    let requests = RequestWorkflow::new(store.clone(), audit.clone());
    let reviews = ReviewWorkflow::new(resources, audit.clone());

    AppState {
        config: Arc::new(config),
        store,
        auth,
        tokens,
        api_keys,
        audit,
        rate_limiter,
        requests,
        reviews,
    }
}
