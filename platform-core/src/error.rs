use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Reason an authentication attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
    /// No credential present in the request.
    MissingCredential,
    /// Credential could not be parsed.
    Malformed,
    /// Signature did not verify against the signing key.
    BadSignature,
    /// Credential past its expiry.
    Expired,
    /// Refresh token presented a second time; the whole family is revoked.
    Reused,
    /// Credential (or its family) has been revoked.
    Revoked,
    /// Credential does not reference any known record.
    NotFound,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredential => "missing_credential",
            AuthFailure::Malformed => "malformed",
            AuthFailure::BadSignature => "bad_signature",
            AuthFailure::Expired => "expired",
            AuthFailure::Reused => "reused",
            AuthFailure::Revoked => "revoked",
            AuthFailure::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform-wide error taxonomy. Every collaborator surface maps its
/// failures into these variants so callers see a uniform contract.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(AuthFailure),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Workflow conflict: {0}")]
    WorkflowConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Authorization failure naming the permission the caller lacks.
    pub fn missing_permission(permission: impl std::fmt::Display) -> Self {
        AppError::AuthorizationDenied(format!("missing permission: {}", permission))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body, retry_after) = match self {
            AppError::AuthenticationFailed(failure) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: format!("Authentication failed: {}", failure),
                    failure: Some(failure.as_str()),
                    details: None,
                },
                None,
            ),
            AppError::AuthorizationDenied(msg) => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    error: format!("Authorization denied: {}", msg),
                    failure: None,
                    details: None,
                },
                None,
            ),
            AppError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    error: "Too many requests".to_string(),
                    failure: None,
                    details: Some(format!("retry after {}s", retry_after)),
                },
                Some(retry_after),
            ),
            AppError::WorkflowConflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    error: format!("Workflow conflict: {}", msg),
                    failure: None,
                    details: None,
                },
                None,
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: format!("Not found: {}", msg),
                    failure: None,
                    details: None,
                },
                None,
            ),
            AppError::Validation(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    error: "Validation error".to_string(),
                    failure: None,
                    details: Some(err.to_string()),
                },
                None,
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: msg,
                    failure: None,
                    details: None,
                },
                None,
            ),
            AppError::Database(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Database error".to_string(),
                    failure: None,
                    details: Some(err.to_string()),
                },
                None,
            ),
            AppError::Config(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Configuration error".to_string(),
                    failure: None,
                    details: Some(err.to_string()),
                },
                None,
            ),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Internal server error".to_string(),
                    failure: None,
                    details: Some(err.to_string()),
                },
                None,
            ),
        };

        let mut res = (status, Json(body)).into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_maps_to_401() {
        let res = AppError::AuthenticationFailed(AuthFailure::Reused).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn rate_limited_carries_retry_after_header() {
        let res = AppError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            res.headers()
                .get(axum::http::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
            Some("42")
        );
    }

    #[test]
    fn workflow_conflict_maps_to_409() {
        let res = AppError::WorkflowConflict("already decided".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn missing_permission_names_the_permission() {
        match AppError::missing_permission("audit.view") {
            AppError::AuthorizationDenied(msg) => assert!(msg.contains("audit.view")),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
