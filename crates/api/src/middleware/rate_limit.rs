//! Per-student rate limiting of location submissions.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::STUDENT_ID_HEADER;

type StudentRateLimiter = RateLimiter<Uuid, DefaultKeyedStateStore<Uuid>, DefaultClock>;

/// Allows `samples` submissions per `window` for each student.
pub struct RateLimiterState {
    limiter: StudentRateLimiter,
    clock: DefaultClock,
    samples: u32,
    window: Duration,
}

impl RateLimiterState {
    /// Returns `None` when either limit is zero, which disables limiting.
    pub fn new(samples: u32, window: Duration) -> Option<Self> {
        let burst = NonZeroU32::new(samples)?;
        let quota = Quota::with_period(window / samples)?.allow_burst(burst);
        Some(Self {
            limiter: RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
            samples,
            window,
        })
    }

    /// `Err` carries the seconds to wait before the next sample is accepted.
    pub fn check(&self, student_id: Uuid) -> Result<(), u64> {
        self.limiter.check_key(&student_id).map_err(|not_until| {
            not_until.wait_time_from(self.clock.now()).as_secs().max(1)
        })
    }

    /// Drops idle per-student buckets.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("samples", &self.samples)
            .field("window", &self.window)
            .field("tracked_students", &self.limiter.len())
            .finish()
    }
}

/// Rejects a student's request with 429 once their quota is used up.
///
/// Requests without a parseable student header pass through; the route's
/// extractor rejects them.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let student_id = req
        .headers()
        .get(STUDENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok());

    if let (Some(student_id), Some(limiter)) = (student_id, state.rate_limiter.as_ref()) {
        if let Err(retry_after_secs) = limiter.check(student_id) {
            tracing::warn!(student_id = %student_id, retry_after_secs, "Location rate limit exceeded");
            metrics::counter!("location_rate_limited_total").increment(1);
            return ApiError::RateLimited { retry_after_secs }.into_response();
        }
    }

    next.run(req).await
}
