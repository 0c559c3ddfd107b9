//! Persistence layer for the geo-attendance backend.
//!
//! This crate contains:
//! - Database connection management and embedded migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain storage contracts

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;

use domain::errors::StoreError;

/// Maps a driver error onto the domain storage taxonomy.
///
/// Decode failures mean a stored row is unusable; everything else is treated
/// as the database being unavailable.
pub fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            tracing::error!(error = %err, "Stored row could not be decoded");
            StoreError::Corrupt(err.to_string())
        }
        other => {
            tracing::error!(error = %other, "Database operation failed");
            StoreError::Unavailable(other.to_string())
        }
    }
}
