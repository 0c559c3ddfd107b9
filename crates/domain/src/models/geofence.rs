//! Geofence domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::services::geometry::{self, EARTH_RADIUS_METERS};

/// Kind of school area a geofence covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FenceType {
    SchoolGrounds,
    Classroom,
    BusRoute,
    Playground,
    Cafeteria,
    Library,
}

impl FenceType {
    /// Converts to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FenceType::SchoolGrounds => "SCHOOL_GROUNDS",
            FenceType::Classroom => "CLASSROOM",
            FenceType::BusRoute => "BUS_ROUTE",
            FenceType::Playground => "PLAYGROUND",
            FenceType::Cafeteria => "CAFETERIA",
            FenceType::Library => "LIBRARY",
        }
    }

    /// Parses from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SCHOOL_GROUNDS" => Some(FenceType::SchoolGrounds),
            "CLASSROOM" => Some(FenceType::Classroom),
            "BUS_ROUTE" => Some(FenceType::BusRoute),
            "PLAYGROUND" => Some(FenceType::Playground),
            "CAFETERIA" => Some(FenceType::Cafeteria),
            "LIBRARY" => Some(FenceType::Library),
            _ => None,
        }
    }

    /// Overlap priority, lower wins. More specific areas rank first.
    pub fn priority(&self) -> u8 {
        match self {
            FenceType::Classroom => 0,
            FenceType::Library => 1,
            FenceType::Cafeteria => 2,
            FenceType::Playground => 3,
            FenceType::BusRoute => 4,
            FenceType::SchoolGrounds => 5,
        }
    }
}

impl std::fmt::Display for FenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Spatial boundary of a geofence. Exactly one variant is ever populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FenceShape {
    #[serde(rename_all = "camelCase")]
    Circle {
        center: Coordinate,
        radius_meters: f64,
    },
    #[serde(rename_all = "camelCase")]
    Polygon { ring: Vec<Coordinate> },
}

impl FenceShape {
    /// Builds a validated circular shape.
    pub fn circle(latitude: f64, longitude: f64, radius_meters: f64) -> Result<Self, ValidationError> {
        let shape = FenceShape::Circle {
            center: Coordinate::new(latitude, longitude),
            radius_meters,
        };
        shape.validate()?;
        Ok(shape)
    }

    /// Builds a validated polygon shape from a closed ring.
    pub fn polygon(ring: Vec<Coordinate>) -> Result<Self, ValidationError> {
        let shape = FenceShape::Polygon { ring };
        shape.validate()?;
        Ok(shape)
    }

    /// Checks coordinate ranges, the radius bounds and ring closure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            FenceShape::Circle {
                center,
                radius_meters,
            } => {
                shared::validation::validate_latitude(center.latitude)?;
                shared::validation::validate_longitude(center.longitude)?;
                shared::validation::validate_radius_meters(*radius_meters)
            }
            FenceShape::Polygon { ring } => {
                let points: Vec<(f64, f64)> =
                    ring.iter().map(|c| (c.latitude, c.longitude)).collect();
                shared::validation::validate_ring(&points)
            }
        }
    }

    /// Approximate covered area in square meters, used for overlap tie-breaks.
    pub fn approximate_area_sq_meters(&self) -> f64 {
        match self {
            FenceShape::Circle { radius_meters, .. } => {
                std::f64::consts::PI * radius_meters * radius_meters
            }
            FenceShape::Polygon { ring } => {
                let Some(origin) = ring.first() else {
                    return 0.0;
                };
                let projected: Vec<(f64, f64)> = ring
                    .iter()
                    .map(|c| geometry::project_local(*origin, *c, EARTH_RADIUS_METERS))
                    .collect();
                let twice_area: f64 = projected
                    .windows(2)
                    .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
                    .sum();
                twice_area.abs() / 2.0
            }
        }
    }
}

fn validate_shape(shape: &FenceShape) -> Result<(), ValidationError> {
    shape.validate()
}

/// Represents a geofence in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub fence_type: FenceType,
    pub active: bool,
    pub shape: FenceShape,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Default active status for new geofences.
fn default_active() -> bool {
    true
}

/// Request payload for creating a geofence.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGeofenceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub fence_type: FenceType,

    #[validate(custom(function = "validate_shape"))]
    pub shape: FenceShape,

    #[serde(default = "default_active")]
    pub active: bool,
}

/// Request payload for updating a geofence (partial update).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGeofenceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub fence_type: Option<FenceType>,

    #[validate(custom(function = "validate_shape"))]
    pub shape: Option<FenceShape>,

    pub active: Option<bool>,
}

/// Response payload for geofence operations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceResponse {
    pub id: Uuid,
    pub name: String,
    pub fence_type: FenceType,
    pub active: bool,
    pub shape: FenceShape,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Geofence> for GeofenceResponse {
    fn from(g: Geofence) -> Self {
        Self {
            id: g.id,
            name: g.name,
            fence_type: g.fence_type,
            active: g.active,
            shape: g.shape,
            created_at: g.created_at,
            updated_at: g.updated_at,
        }
    }
}

/// Response for listing geofences.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGeofencesResponse {
    pub geofences: Vec<GeofenceResponse>,
    pub total: usize,
}

/// Query parameters for listing geofences.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGeofencesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_ring() -> Vec<Coordinate> {
        vec![
            Coordinate::new(24.7100, 46.6700),
            Coordinate::new(24.7100, 46.6800),
            Coordinate::new(24.7200, 46.6800),
            Coordinate::new(24.7200, 46.6700),
            Coordinate::new(24.7100, 46.6700),
        ]
    }

    #[test]
    fn test_fence_type_round_trip_strings() {
        for fence_type in [
            FenceType::SchoolGrounds,
            FenceType::Classroom,
            FenceType::BusRoute,
            FenceType::Playground,
            FenceType::Cafeteria,
            FenceType::Library,
        ] {
            assert_eq!(FenceType::parse(fence_type.as_str()), Some(fence_type));
        }
        assert_eq!(FenceType::parse("GYM"), None);
    }

    #[test]
    fn test_fence_type_serialization() {
        let json = serde_json::to_string(&FenceType::SchoolGrounds).unwrap();
        assert_eq!(json, "\"SCHOOL_GROUNDS\"");
    }

    #[test]
    fn test_classroom_outranks_school_grounds() {
        assert!(FenceType::Classroom.priority() < FenceType::SchoolGrounds.priority());
    }

    #[test]
    fn test_circle_radius_bounds() {
        assert!(FenceShape::circle(24.7136, 46.6753, 500.0).is_ok());
        assert!(FenceShape::circle(24.7136, 46.6753, 5.0).is_err());
        assert!(FenceShape::circle(24.7136, 46.6753, 6000.0).is_err());
        assert!(FenceShape::circle(95.0, 46.6753, 100.0).is_err());
    }

    #[test]
    fn test_polygon_requires_closed_ring() {
        assert!(FenceShape::polygon(square_ring()).is_ok());

        let mut open = square_ring();
        open.pop();
        assert!(FenceShape::polygon(open).is_err());
    }

    #[test]
    fn test_shape_deserialization_circle() {
        let json = r#"{
            "kind": "circle",
            "center": {"latitude": 24.7136, "longitude": 46.6753},
            "radiusMeters": 500.0
        }"#;
        let shape: FenceShape = serde_json::from_str(json).unwrap();
        match shape {
            FenceShape::Circle { radius_meters, .. } => assert_eq!(radius_meters, 500.0),
            _ => panic!("expected circle"),
        }
    }

    #[test]
    fn test_circle_area() {
        let shape = FenceShape::circle(0.0, 0.0, 100.0).unwrap();
        let area = shape.approximate_area_sq_meters();
        assert!((area - std::f64::consts::PI * 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_polygon_area_is_positive_and_plausible() {
        let shape = FenceShape::polygon(square_ring()).unwrap();
        let area = shape.approximate_area_sq_meters();
        // ~1.11 km north-south by ~1.01 km east-west at this latitude
        assert!(area > 1_000_000.0 && area < 1_300_000.0, "area = {area}");
    }

    #[test]
    fn test_create_request_deserialization() {
        let json = r#"{
            "name": "Main Campus",
            "fenceType": "SCHOOL_GROUNDS",
            "shape": {
                "kind": "circle",
                "center": {"latitude": 24.7136, "longitude": 46.6753},
                "radiusMeters": 500.0
            }
        }"#;
        let request: CreateGeofenceRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.fence_type, FenceType::SchoolGrounds);
        assert!(request.active);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_small_radius() {
        let json = r#"{
            "name": "Tiny",
            "fenceType": "CLASSROOM",
            "shape": {
                "kind": "circle",
                "center": {"latitude": 24.7136, "longitude": 46.6753},
                "radiusMeters": 2.0
            }
        }"#;
        let request: CreateGeofenceRequest = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListGeofencesQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.include_inactive);
    }
}
