//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Failure reported by a storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the operation.
    /// Callers may retry the whole submission.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A stored row violates a domain invariant.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Failure of the evaluate/classify/mark pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A fence or enrollment from another tenant reached the engine.
    #[error("Tenant isolation violated: {entity} {entity_id} belongs to tenant {found}, expected {expected}")]
    TenantIsolation {
        entity: &'static str,
        entity_id: Uuid,
        expected: Uuid,
        found: Uuid,
    },

    /// Containment state kept changing underneath the optimistic update.
    #[error("Containment state for student {student_id} changed concurrently")]
    Conflict { student_id: Uuid },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl EngineError {
    /// Whether the caller may resubmit the same sample.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Conflict { .. } | EngineError::Storage(StoreError::Unavailable(_))
        )
    }
}
