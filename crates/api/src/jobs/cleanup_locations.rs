//! Location sample retention job.

use persistence::repositories::LocationRepository;
use std::future::Future;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

/// Deletes location samples older than the retention period.
///
/// Events and attendance rows are kept; only raw samples expire.
pub struct CleanupLocationsJob {
    repo: LocationRepository,
    retention_days: u32,
    batch_size: i64,
}

impl CleanupLocationsJob {
    pub fn new(repo: LocationRepository, retention_days: u32, batch_size: i64) -> Self {
        Self {
            repo,
            retention_days,
            batch_size: batch_size.max(1),
        }
    }
}

/// Calls `delete_batch` until a batch comes back short. Returns the total removed.
pub(crate) async fn drain_in_batches<F, Fut, E>(batch_size: i64, mut delete_batch: F) -> Result<u64, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<u64, E>>,
{
    let mut total_deleted: u64 = 0;
    loop {
        let deleted = delete_batch().await?;
        total_deleted += deleted;

        if deleted < batch_size as u64 {
            break;
        }
        tokio::task::yield_now().await;
    }
    Ok(total_deleted)
}

#[async_trait::async_trait]
impl Job for CleanupLocationsJob {
    fn name(&self) -> &'static str {
        "cleanup_locations"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<(), String> {
        let deleted = drain_in_batches(self.batch_size, || {
            self.repo.delete_expired_batch(self.retention_days, self.batch_size)
        })
        .await
        .map_err(|e| format!("Failed to delete expired location samples: {}", e))?;

        info!(
            deleted,
            retention_days = self.retention_days,
            "Cleaned up expired location samples"
        );
        Ok(())
    }
}
