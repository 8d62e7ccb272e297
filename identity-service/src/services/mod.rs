pub mod api_key;
pub mod audit;
pub mod auth;
pub mod jwt;
pub mod permissions;
pub mod provider;
pub mod rate_limit;
pub mod request_workflow;
pub mod review_workflow;
pub mod token;

pub use api_key::ApiKeyService;
pub use audit::AuditLogger;
pub use auth::AuthService;
pub use jwt::{AccessTokenClaims, JwtService, TokenResponse};
pub use provider::{HttpIdentityProvider, IdentityProvider, StubProvider};
pub use rate_limit::RateLimitService;
pub use request_workflow::RequestWorkflow;
pub use review_workflow::ReviewWorkflow;
pub use token::TokenService;
