//! Fixed-window rate limiter over the credential store.
//!
//! Counters are advanced with a single atomic increment-and-compare per
//! window, so two concurrent requests can never both squeeze through the
//! last remaining slot. Stale windows are reset by their trailing
//! timestamp; there is no sweeper.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use platform_core::error::AppError;

use crate::config::RateLimitConfig;
use crate::models::{Actor, BaseRole, RateCeiling};
use crate::store::CredentialStore;

const MINUTE: i64 = 60;
const DAY: i64 = 86_400;

/// Ceiling for interactive (token-authenticated) traffic by role tier.
/// API-key traffic uses the ceiling stored on the key instead.
pub fn ceiling_for_actor(actor: &Actor, config: &RateLimitConfig) -> RateCeiling {
    match actor.base_role {
        Some(BaseRole::Administrator) => config.administrator,
        Some(BaseRole::Curator) => config.curator,
        Some(BaseRole::Explorator) | None => config.explorator,
    }
}

#[derive(Clone)]
pub struct RateLimitService {
    store: Arc<dyn CredentialStore>,
}

impl RateLimitService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Admit or reject one request against both granularities. The bucket
    /// key identifies the caller (identity id or API key id); a denied
    /// request still counts against the windows it passed.
    pub async fn admit(
        &self,
        bucket: &str,
        ceiling: RateCeiling,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let ts = now.timestamp();

        let minute_start = ts - ts.rem_euclid(MINUTE);
        let minute_count = self
            .store
            .incr_window(&format!("min:{}", bucket), minute_start)
            .await?;
        if minute_count > ceiling.per_minute {
            return Err(AppError::RateLimited {
                retry_after: (minute_start + MINUTE - ts).max(1) as u64,
            });
        }

        let day_start = ts - ts.rem_euclid(DAY);
        let day_count = self
            .store
            .incr_window(&format!("day:{}", bucket), day_start)
            .await?;
        if day_count > ceiling.per_day {
            return Err(AppError::RateLimited {
                retry_after: (day_start + DAY - ts).max(1) as u64,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> RateLimitService {
        RateLimitService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn requests_within_the_ceiling_pass() {
        let svc = service();
        let ceiling = RateCeiling {
            per_minute: 3,
            per_day: 100,
        };
        let now = Utc::now();
        for _ in 0..3 {
            svc.admit("id-1", ceiling, now).await.unwrap();
        }
    }

    #[tokio::test]
    async fn the_request_past_the_minute_ceiling_is_denied_with_retry_after() {
        let svc = service();
        let ceiling = RateCeiling {
            per_minute: 2,
            per_day: 100,
        };
        let now = Utc::now();
        svc.admit("id-1", ceiling, now).await.unwrap();
        svc.admit("id-1", ceiling, now).await.unwrap();
        match svc.admit("id-1", ceiling, now).await {
            Err(AppError::RateLimited { retry_after }) => {
                assert!(retry_after >= 1 && retry_after <= 60);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn day_ceiling_binds_independently_of_minute() {
        let svc = service();
        let ceiling = RateCeiling {
            per_minute: 100,
            per_day: 2,
        };
        let now = Utc::now();
        svc.admit("id-1", ceiling, now).await.unwrap();
        svc.admit("id-1", ceiling, now).await.unwrap();
        match svc.admit("id-1", ceiling, now).await {
            Err(AppError::RateLimited { retry_after }) => {
                assert!(retry_after <= DAY as u64);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn a_new_minute_window_clears_the_counter() {
        let svc = service();
        let ceiling = RateCeiling {
            per_minute: 1,
            per_day: 100,
        };
        let now = Utc::now();
        svc.admit("id-1", ceiling, now).await.unwrap();
        assert!(svc.admit("id-1", ceiling, now).await.is_err());

        let next_window = now + chrono::Duration::seconds(MINUTE);
        svc.admit("id-1", ceiling, next_window).await.unwrap();
    }

    #[tokio::test]
    async fn buckets_are_isolated() {
        let svc = service();
        let ceiling = RateCeiling {
            per_minute: 1,
            per_day: 100,
        };
        let now = Utc::now();
        svc.admit("id-1", ceiling, now).await.unwrap();
        svc.admit("id-2", ceiling, now).await.unwrap();
    }
}
