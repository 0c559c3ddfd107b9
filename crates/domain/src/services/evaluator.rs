//! Geofence evaluator.
//!
//! Determines containment and distance of a location sample against every
//! active geofence of the sample's tenant. Pure and deterministic: the same
//! sample and fence set always produce the same results.

use serde::Serialize;
use std::cmp::Ordering;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::{Coordinate, FenceShape, Geofence, LocationSample};
use crate::services::geometry;

/// Containment result of one sample against one geofence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub geofence_id: Uuid,
    pub is_inside: bool,
    pub distance_meters: f64,
}

/// Evaluates `sample` against `fences`.
///
/// Inactive fences are skipped. A fence owned by another tenant is a caller
/// bug and aborts the evaluation instead of being filtered out.
pub fn evaluate(
    sample: &LocationSample,
    fences: &[Geofence],
) -> Result<Vec<EvaluationResult>, EngineError> {
    ensure_same_tenant(sample.tenant_id, fences)?;

    let point = sample.coordinate();
    Ok(fences
        .iter()
        .filter(|fence| fence.active)
        .map(|fence| evaluate_fence(point, fence))
        .collect())
}

/// Evaluates a single point against a single fence.
pub fn evaluate_fence(point: Coordinate, fence: &Geofence) -> EvaluationResult {
    let (is_inside, distance_meters) = match &fence.shape {
        FenceShape::Circle {
            center,
            radius_meters,
        } => {
            let distance = geometry::haversine_distance(point, *center);
            (distance <= *radius_meters, distance)
        }
        FenceShape::Polygon { ring } => {
            if geometry::ring_contains(ring, point) {
                (true, 0.0)
            } else {
                (false, geometry::distance_to_ring(ring, point))
            }
        }
    };

    EvaluationResult {
        geofence_id: fence.id,
        is_inside,
        distance_meters,
    }
}

fn ensure_same_tenant(tenant_id: Uuid, fences: &[Geofence]) -> Result<(), EngineError> {
    match fences.iter().find(|fence| fence.tenant_id != tenant_id) {
        Some(foreign) => {
            tracing::error!(
                tenant_id = %tenant_id,
                geofence_id = %foreign.id,
                fence_tenant_id = %foreign.tenant_id,
                "Foreign-tenant geofence passed to evaluator"
            );
            Err(EngineError::TenantIsolation {
                entity: "geofence",
                entity_id: foreign.id,
                expected: tenant_id,
                found: foreign.tenant_id,
            })
        }
        None => Ok(()),
    }
}

/// Orders the fences that contain the sample, most specific first.
///
/// Ordering: fence type specificity, then approximate area ascending, then
/// fence id, so the choice is deterministic even for circle/polygon ties.
pub fn prioritize<'a>(results: &[EvaluationResult], fences: &'a [Geofence]) -> Vec<&'a Geofence> {
    let mut containing: Vec<&Geofence> = fences
        .iter()
        .filter(|fence| {
            results
                .iter()
                .any(|r| r.geofence_id == fence.id && r.is_inside)
        })
        .collect();
    containing.sort_by(|a, b| overlap_order(a, b));
    containing
}

/// The fence that represents the sample when several contain it.
pub fn primary_fence<'a>(
    results: &[EvaluationResult],
    fences: &'a [Geofence],
) -> Option<&'a Geofence> {
    prioritize(results, fences).into_iter().next()
}

fn overlap_order(a: &Geofence, b: &Geofence) -> Ordering {
    a.fence_type
        .priority()
        .cmp(&b.fence_type.priority())
        .then_with(|| {
            a.shape
                .approximate_area_sq_meters()
                .total_cmp(&b.shape.approximate_area_sq_meters())
        })
        .then_with(|| a.id.cmp(&b.id))
}
