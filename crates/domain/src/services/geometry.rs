//! Spherical distance and planar polygon helpers.
//!
//! All inputs are decimal degrees, all outputs are meters in double precision.

use geo::{Coord, Intersects, LineString, Polygon};

use crate::models::Coordinate;

/// Mean Earth radius used for every distance computation.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates using the haversine formula.
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Projects `point` onto a local equirectangular plane centered at `origin`.
///
/// Returns `(east, north)` in meters. Longitude deltas are wrapped to
/// [-180, 180] so rings crossing the antimeridian stay contiguous.
pub fn project_local(origin: Coordinate, point: Coordinate, radius: f64) -> (f64, f64) {
    let mut d_lon = point.longitude - origin.longitude;
    if d_lon > 180.0 {
        d_lon -= 360.0;
    } else if d_lon < -180.0 {
        d_lon += 360.0;
    }
    let x = d_lon.to_radians() * origin.latitude.to_radians().cos() * radius;
    let y = (point.latitude - origin.latitude).to_radians() * radius;
    (x, y)
}

/// Whether `point` lies inside or on the boundary of the closed `ring`.
///
/// Ring and point are projected around the first vertex, so rings spanning
/// the antimeridian stay contiguous.
pub fn ring_contains(ring: &[Coordinate], point: Coordinate) -> bool {
    let Some(&origin) = ring.first() else {
        return false;
    };
    let project = |c: Coordinate| {
        let (x, y) = project_local(origin, c, EARTH_RADIUS_METERS);
        Coord { x, y }
    };

    let exterior: LineString<f64> = ring.iter().map(|&c| project(c)).collect::<Vec<_>>().into();
    Polygon::new(exterior, vec![]).intersects(&project(point))
}

/// Minimum distance in meters from `point` to any edge of `ring`.
pub fn distance_to_ring(ring: &[Coordinate], point: Coordinate) -> f64 {
    ring.windows(2)
        .map(|edge| {
            let a = project_local(point, edge[0], EARTH_RADIUS_METERS);
            let b = project_local(point, edge[1], EARTH_RADIUS_METERS);
            distance_origin_to_segment(a, b)
        })
        .fold(f64::INFINITY, f64::min)
}

/// Distance from the plane origin to the segment `a`-`b`.
fn distance_origin_to_segment(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq == 0.0 {
        0.0
    } else {
        (-(a.0 * dx + a.1 * dy) / length_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    (cx * cx + cy * cy).sqrt()
}
