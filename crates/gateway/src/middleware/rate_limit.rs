//! Request-level rate limiting using a token bucket
//!
//! Distinct from the per-source limiter inside the federation layer: this
//! bounds inbound request volume for the whole process and surfaces as the
//! RateLimited error kind.

use crate::AppState;
use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use citeguard_common::errors::CoreError;
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Create a new rate limiter
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> Arc<GlobalRateLimiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second.max(1)).unwrap())
        .allow_burst(NonZeroU32::new(burst.max(1)).unwrap());

    Arc::new(RateLimiter::direct(quota))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, CoreError> {
    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            tracing::warn!("Request-level rate limit exceeded");
            return Err(CoreError::RateLimited {
                limit: state.service.context().config.rate_limit.requests_per_second,
            });
        }
    }
    Ok(next.run(request).await)
}
