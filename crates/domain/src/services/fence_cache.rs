//! Read-through TTL cache in front of a [`FenceRepository`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::Geofence;
use crate::services::store::FenceRepository;

#[derive(Clone)]
struct CachedFences {
    fences: Vec<Geofence>,
    loaded_at: Instant,
}

/// Caches active fences per tenant for `ttl`.
///
/// Mutating routes call [`invalidate`](Self::invalidate) so edits are
/// visible on the next sample instead of after expiry.
pub struct CachedFenceRepository {
    inner: Arc<dyn FenceRepository>,
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, CachedFences>>,
}

impl CachedFenceRepository {
    pub fn new(inner: Arc<dyn FenceRepository>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drops the cached fences of one tenant.
    pub async fn invalidate(&self, tenant_id: Uuid) {
        if self.entries.write().await.remove(&tenant_id).is_some() {
            tracing::debug!(tenant_id = %tenant_id, "Geofence cache invalidated");
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl FenceRepository for CachedFenceRepository {
    async fn active_fences_for(&self, tenant_id: Uuid) -> Result<Vec<Geofence>, StoreError> {
        if let Some(entry) = self.entries.read().await.get(&tenant_id) {
            if entry.loaded_at.elapsed() < self.ttl {
                return Ok(entry.fences.clone());
            }
        }

        let fences = self.inner.active_fences_for(tenant_id).await?;

        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.loaded_at.elapsed() < self.ttl);
        entries.insert(
            tenant_id,
            CachedFences {
                fences: fences.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(fences)
    }
}
