//! Geofence entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::errors::StoreError;
use domain::models::{Coordinate, FenceShape, FenceType, Geofence};

/// Database row mapping for the geofences table.
#[derive(Debug, Clone, FromRow)]
pub struct GeofenceEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub fence_type: String,
    pub active: bool,
    pub center_latitude: Option<f64>,
    pub center_longitude: Option<f64>,
    pub radius_meters: Option<f64>,
    pub polygon: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values of a shape, as bound in INSERT and UPDATE statements.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeColumns {
    pub center_latitude: Option<f64>,
    pub center_longitude: Option<f64>,
    pub radius_meters: Option<f64>,
    pub polygon: Option<serde_json::Value>,
}

impl From<&FenceShape> for ShapeColumns {
    fn from(shape: &FenceShape) -> Self {
        match shape {
            FenceShape::Circle {
                center,
                radius_meters,
            } => Self {
                center_latitude: Some(center.latitude),
                center_longitude: Some(center.longitude),
                radius_meters: Some(*radius_meters),
                polygon: None,
            },
            FenceShape::Polygon { ring } => Self {
                center_latitude: None,
                center_longitude: None,
                radius_meters: None,
                polygon: Some(serde_json::json!(ring)),
            },
        }
    }
}

impl GeofenceEntity {
    fn shape(&self) -> Result<FenceShape, StoreError> {
        let corrupt = |detail: String| StoreError::Corrupt(format!("geofence {}: {}", self.id, detail));

        let shape = match (
            self.center_latitude,
            self.center_longitude,
            self.radius_meters,
            &self.polygon,
        ) {
            (Some(latitude), Some(longitude), Some(radius_meters), None) => FenceShape::Circle {
                center: Coordinate::new(latitude, longitude),
                radius_meters,
            },
            (None, None, None, Some(polygon)) => {
                let ring: Vec<Coordinate> = serde_json::from_value(polygon.clone())
                    .map_err(|e| corrupt(format!("unreadable polygon ring: {e}")))?;
                FenceShape::Polygon { ring }
            }
            _ => return Err(corrupt("row must hold exactly one shape".to_string())),
        };

        shape.validate().map_err(|e| corrupt(e.to_string()))?;
        Ok(shape)
    }
}

impl TryFrom<GeofenceEntity> for Geofence {
    type Error = StoreError;

    fn try_from(entity: GeofenceEntity) -> Result<Self, Self::Error> {
        let fence_type = FenceType::parse(&entity.fence_type).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "geofence {}: unknown fence type {}",
                entity.id, entity.fence_type
            ))
        })?;
        let shape = entity.shape()?;

        Ok(Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            name: entity.name,
            fence_type,
            active: entity.active,
            shape,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}
