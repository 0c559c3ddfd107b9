//! Drops idle per-student rate limit buckets.

use std::sync::Arc;

use super::scheduler::{Job, JobFrequency};
use crate::middleware::RateLimiterState;

pub struct SweepRateLimitsJob {
    limiter: Arc<RateLimiterState>,
}

impl SweepRateLimitsJob {
    pub fn new(limiter: Arc<RateLimiterState>) -> Self {
        Self { limiter }
    }
}

#[async_trait::async_trait]
impl Job for SweepRateLimitsJob {
    fn name(&self) -> &'static str {
        "sweep_rate_limits"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(5)
    }

    async fn execute(&self) -> Result<(), String> {
        self.limiter.retain_recent();
        Ok(())
    }
}
