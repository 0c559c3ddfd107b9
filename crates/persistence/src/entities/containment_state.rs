//! Containment state entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::ContainmentState;

/// Database row mapping for the containment_states table.
#[derive(Debug, Clone, FromRow)]
pub struct ContainmentStateEntity {
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub geofence_id: Uuid,
    pub was_inside: bool,
    pub last_evaluated_at: DateTime<Utc>,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl From<ContainmentStateEntity> for ContainmentState {
    fn from(entity: ContainmentStateEntity) -> Self {
        Self {
            tenant_id: entity.tenant_id,
            student_id: entity.student_id,
            geofence_id: entity.geofence_id,
            was_inside: entity.was_inside,
            last_evaluated_at: entity.last_evaluated_at,
            last_event_at: entity.last_event_at,
        }
    }
}
