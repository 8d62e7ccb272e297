//! Service configuration, loaded from the environment at startup.

use platform_core::config::{get_env, get_env_parse};
use platform_core::error::AppError;

use crate::models::RateCeiling;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HS256 signing secret shared by issuance and verification.
    pub signing_secret: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

/// External identity provider used for the code-exchange login step.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout_seconds: u64,
}

/// Per-tier request ceilings for interactive (token) traffic. API keys
/// carry their own ceilings snapshotted at issuance.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub administrator: RateCeiling,
    pub curator: RateCeiling,
    pub explorator: RateCeiling,
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub mongo: MongoConfig,
    pub jwt: JwtConfig,
    pub provider: ProviderConfig,
    pub rate_limits: RateLimitConfig,
    pub log_level: String,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let environment = match get_env("ENVIRONMENT", Some("development"), false)?.as_str() {
            "production" => Environment::Production,
            _ => Environment::Development,
        };
        let required = environment.is_production();

        Ok(Self {
            environment,
            server: ServerConfig {
                host: get_env("HOST", Some("0.0.0.0"), false)?,
                port: get_env_parse("PORT", Some("8084"), false)?,
            },
            mongo: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), required)?,
                database: get_env("MONGODB_DATABASE", Some("identity"), false)?,
            },
            jwt: JwtConfig {
                signing_secret: get_env(
                    "JWT_SIGNING_SECRET",
                    Some("dev-only-signing-secret"),
                    required,
                )?,
                access_token_expiry_minutes: get_env_parse(
                    "ACCESS_TOKEN_EXPIRY_MINUTES",
                    Some("15"),
                    false,
                )?,
                refresh_token_expiry_days: get_env_parse(
                    "REFRESH_TOKEN_EXPIRY_DAYS",
                    Some("7"),
                    false,
                )?,
            },
            provider: ProviderConfig {
                token_url: get_env(
                    "PROVIDER_TOKEN_URL",
                    Some("http://localhost:9000/oauth/token"),
                    required,
                )?,
                client_id: get_env("PROVIDER_CLIENT_ID", Some("identity-dev"), required)?,
                client_secret: get_env("PROVIDER_CLIENT_SECRET", Some("dev-secret"), required)?,
                timeout_seconds: get_env_parse("PROVIDER_TIMEOUT_SECONDS", Some("10"), false)?,
            },
            rate_limits: RateLimitConfig {
                administrator: RateCeiling {
                    per_minute: get_env_parse("RATE_ADMIN_PER_MINUTE", Some("600"), false)?,
                    per_day: get_env_parse("RATE_ADMIN_PER_DAY", Some("500000"), false)?,
                },
                curator: RateCeiling {
                    per_minute: get_env_parse("RATE_CURATOR_PER_MINUTE", Some("240"), false)?,
                    per_day: get_env_parse("RATE_CURATOR_PER_DAY", Some("100000"), false)?,
                },
                explorator: RateCeiling {
                    per_minute: get_env_parse("RATE_EXPLORATOR_PER_MINUTE", Some("60"), false)?,
                    per_day: get_env_parse("RATE_EXPLORATOR_PER_DAY", Some("10000"), false)?,
                },
            },
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
        })
    }
}
