//! Per-caller rate limiting. Runs after authentication so the bucket and
//! ceiling come from the resolved `AuthContext`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use platform_core::error::AppError;

use crate::middleware::auth::AuthContext;
use crate::AppState;

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(context) = req.extensions().get::<AuthContext>() {
        state
            .rate_limiter
            .admit(&context.rate_key, context.ceiling, Utc::now())
            .await?;
    }
    Ok(next.run(req).await)
}
