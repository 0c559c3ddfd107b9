//! Geofence event entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::errors::StoreError;
use domain::models::{GeofenceEvent, GeofenceTransitionType};

/// Database row mapping for the geofence_events table.
#[derive(Debug, Clone, FromRow)]
pub struct GeofenceEventEntity {
    pub event_id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub geofence_id: Uuid,
    pub event_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub occurred_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<GeofenceEventEntity> for GeofenceEvent {
    type Error = StoreError;

    fn try_from(entity: GeofenceEventEntity) -> Result<Self, Self::Error> {
        let event_type = GeofenceTransitionType::parse(&entity.event_type).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "geofence event {}: unknown event type {}",
                entity.event_id, entity.event_type
            ))
        })?;

        Ok(Self {
            event_id: entity.event_id,
            tenant_id: entity.tenant_id,
            student_id: entity.student_id,
            geofence_id: entity.geofence_id,
            event_type,
            latitude: entity.latitude,
            longitude: entity.longitude,
            accuracy: entity.accuracy,
            occurred_at: entity.occurred_at,
            processed_at: entity.processed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_entity() -> GeofenceEventEntity {
        GeofenceEventEntity {
            event_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            geofence_id: Uuid::new_v4(),
            event_type: "ENTER".to_string(),
            latitude: 24.7136,
            longitude: 46.6753,
            accuracy: Some(12.0),
            occurred_at: Utc::now(),
            processed_at: None,
        }
    }

    #[test]
    fn test_entity_to_domain() {
        let entity = create_test_entity();
        let event = GeofenceEvent::try_from(entity.clone()).unwrap();

        assert_eq!(event.event_id, entity.event_id);
        assert_eq!(event.event_type, GeofenceTransitionType::Enter);
        assert_eq!(event.accuracy, Some(12.0));
        assert!(event.processed_at.is_none());
    }

    #[test]
    fn test_unknown_event_type_is_corrupt() {
        let mut entity = create_test_entity();
        entity.event_type = "DWELL".to_string();
        assert!(matches!(GeofenceEvent::try_from(entity), Err(StoreError::Corrupt(_))));
    }
}
