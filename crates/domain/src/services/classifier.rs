//! Event classifier.
//!
//! Turns evaluator output plus prior containment memory into ENTER, EXIT and
//! INSIDE events. Performs no I/O: callers load prior state and persist the
//! returned transitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{ContainmentState, GeofenceEvent, GeofenceTransitionType, LocationSample};
use crate::services::evaluator::EvaluationResult;

/// How often INSIDE confirmations are emitted while a student stays inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InsideEventPolicy {
    /// One INSIDE event per sample.
    EverySample,
    /// At most one event per interval since the last emitted event.
    Throttled { interval_secs: u64 },
    /// INSIDE is never emitted.
    Never,
}

impl Default for InsideEventPolicy {
    fn default() -> Self {
        InsideEventPolicy::Throttled { interval_secs: 600 }
    }
}

impl InsideEventPolicy {
    fn should_emit(&self, last_event_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self {
            InsideEventPolicy::EverySample => true,
            InsideEventPolicy::Never => false,
            InsideEventPolicy::Throttled { interval_secs } => match last_event_at {
                None => true,
                Some(last) => {
                    let interval = Duration::seconds(i64::try_from(*interval_secs).unwrap_or(i64::MAX));
                    now.signed_duration_since(last) >= interval
                }
            },
        }
    }
}

/// State change for one (student, geofence) pair, with its optional event.
///
/// `expected_last_evaluated_at` is the optimistic-update guard: the write
/// applies only if the stored state still carries that timestamp (or is
/// still absent when `None`).
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub expected_last_evaluated_at: Option<DateTime<Utc>>,
    pub state: ContainmentState,
    pub event: Option<GeofenceEvent>,
}

/// Output of [`classify`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub transitions: Vec<Transition>,
    /// Fences whose stored state is newer than the sample.
    pub stale: Vec<Uuid>,
}

impl Classification {
    pub fn events(&self) -> impl Iterator<Item = &GeofenceEvent> {
        self.transitions.iter().filter_map(|t| t.event.as_ref())
    }

    pub fn updated_states(&self) -> impl Iterator<Item = &ContainmentState> {
        self.transitions.iter().map(|t| &t.state)
    }
}

/// Classifies evaluator output for one sample.
pub fn classify(
    sample: &LocationSample,
    results: &[EvaluationResult],
    prior: &HashMap<Uuid, ContainmentState>,
    policy: InsideEventPolicy,
) -> Classification {
    let mut classification = Classification::default();
    let now = sample.captured_at;

    for result in results {
        let previous = prior.get(&result.geofence_id);

        if let Some(state) = previous {
            if state.is_stale(now) {
                classification.stale.push(result.geofence_id);
                continue;
            }
        }

        let was_inside = previous.map(|s| s.was_inside).unwrap_or(false);
        let last_event_at = previous.and_then(|s| s.last_event_at);

        let event_type = match (result.is_inside, was_inside) {
            (true, false) => Some(GeofenceTransitionType::Enter),
            (true, true) if policy.should_emit(last_event_at, now) => {
                Some(GeofenceTransitionType::Inside)
            }
            (true, true) => None,
            (false, true) => Some(GeofenceTransitionType::Exit),
            // Outside and already known to be outside: nothing to record.
            (false, false) => continue,
        };

        let event = event_type.map(|event_type| GeofenceEvent {
            event_id: Uuid::new_v4(),
            tenant_id: sample.tenant_id,
            student_id: sample.student_id,
            geofence_id: result.geofence_id,
            event_type,
            latitude: sample.latitude,
            longitude: sample.longitude,
            accuracy: sample.accuracy,
            occurred_at: now,
            processed_at: None,
        });

        classification.transitions.push(Transition {
            expected_last_evaluated_at: previous.map(|s| s.last_evaluated_at),
            state: ContainmentState {
                tenant_id: sample.tenant_id,
                student_id: sample.student_id,
                geofence_id: result.geofence_id,
                was_inside: result.is_inside,
                last_evaluated_at: now,
                last_event_at: if event.is_some() { Some(now) } else { last_event_at },
            },
            event,
        });
    }

    classification
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Fixture {
        tenant_id: Uuid,
        student_id: Uuid,
        geofence_id: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tenant_id: Uuid::new_v4(),
                student_id: Uuid::new_v4(),
                geofence_id: Uuid::new_v4(),
            }
        }

        fn sample(&self, minute: u32) -> LocationSample {
            LocationSample {
                tenant_id: self.tenant_id,
                student_id: self.student_id,
                latitude: 24.7136,
                longitude: 46.6753,
                accuracy: Some(8.0),
                battery_percent: Some(90),
                device_id: None,
                captured_at: Utc.with_ymd_and_hms(2026, 9, 1, 7, minute, 0).unwrap(),
            }
        }

        fn result(&self, is_inside: bool) -> Vec<EvaluationResult> {
            vec![EvaluationResult {
                geofence_id: self.geofence_id,
                is_inside,
                distance_meters: if is_inside { 0.0 } else { 900.0 },
            }]
        }

        fn prior(&self, classification: &Classification) -> HashMap<Uuid, ContainmentState> {
            classification
                .updated_states()
                .map(|s| (s.geofence_id, s.clone()))
                .collect()
        }
    }

    fn event_types(classification: &Classification) -> Vec<GeofenceTransitionType> {
        classification.events().map(|e| e.event_type).collect()
    }

    #[test]
    fn test_first_inside_sample_enters() {
        let f = Fixture::new();
        let out = classify(&f.sample(15), &f.result(true), &HashMap::new(), InsideEventPolicy::EverySample);

        assert_eq!(event_types(&out), vec![GeofenceTransitionType::Enter]);
        let state = out.updated_states().next().unwrap();
        assert!(state.was_inside);
        assert_eq!(out.transitions[0].expected_last_evaluated_at, None);
    }

    #[test]
    fn test_outside_without_prior_is_silent() {
        let f = Fixture::new();
        let out = classify(&f.sample(15), &f.result(false), &HashMap::new(), InsideEventPolicy::EverySample);
        assert!(out.transitions.is_empty());
    }

    #[test]
    fn test_repeat_inside_yields_single_enter_then_inside() {
        let f = Fixture::new();
        let first = classify(&f.sample(15), &f.result(true), &HashMap::new(), InsideEventPolicy::EverySample);
        let second = classify(&f.sample(20), &f.result(true), &f.prior(&first), InsideEventPolicy::EverySample);

        assert_eq!(event_types(&first), vec![GeofenceTransitionType::Enter]);
        assert_eq!(event_types(&second), vec![GeofenceTransitionType::Inside]);
    }

    #[test]
    fn test_exit_after_inside() {
        let f = Fixture::new();
        let first = classify(&f.sample(15), &f.result(true), &HashMap::new(), InsideEventPolicy::Never);
        let second = classify(&f.sample(20), &f.result(false), &f.prior(&first), InsideEventPolicy::Never);

        assert_eq!(event_types(&second), vec![GeofenceTransitionType::Exit]);
        assert!(!second.updated_states().next().unwrap().was_inside);
    }

    #[test]
    fn test_reentry_after_exit() {
        let f = Fixture::new();
        let entered = classify(&f.sample(15), &f.result(true), &HashMap::new(), InsideEventPolicy::Never);
        let exited = classify(&f.sample(20), &f.result(false), &f.prior(&entered), InsideEventPolicy::Never);
        let reentered = classify(&f.sample(25), &f.result(true), &f.prior(&exited), InsideEventPolicy::Never);

        assert_eq!(event_types(&reentered), vec![GeofenceTransitionType::Enter]);
    }

    #[test]
    fn test_outside_after_exit_is_silent() {
        let f = Fixture::new();
        let entered = classify(&f.sample(15), &f.result(true), &HashMap::new(), InsideEventPolicy::Never);
        let exited = classify(&f.sample(20), &f.result(false), &f.prior(&entered), InsideEventPolicy::Never);
        let still_out = classify(&f.sample(25), &f.result(false), &f.prior(&exited), InsideEventPolicy::Never);

        assert!(still_out.transitions.is_empty());
    }

    #[test]
    fn test_never_policy_still_refreshes_state() {
        let f = Fixture::new();
        let first = classify(&f.sample(15), &f.result(true), &HashMap::new(), InsideEventPolicy::Never);
        let second = classify(&f.sample(20), &f.result(true), &f.prior(&first), InsideEventPolicy::Never);

        assert_eq!(second.events().count(), 0);
        assert_eq!(second.transitions.len(), 1);
        let state = &second.transitions[0].state;
        assert_eq!(state.last_evaluated_at, f.sample(20).captured_at);
        assert_eq!(state.last_event_at, Some(f.sample(15).captured_at));
    }

    #[test]
    fn test_throttled_policy_waits_for_interval() {
        let f = Fixture::new();
        let policy = InsideEventPolicy::Throttled { interval_secs: 600 };

        let entered = classify(&f.sample(15), &f.result(true), &HashMap::new(), policy);
        let five_min = classify(&f.sample(20), &f.result(true), &f.prior(&entered), policy);
        assert_eq!(five_min.events().count(), 0);

        let ten_min = classify(&f.sample(25), &f.result(true), &f.prior(&five_min), policy);
        assert_eq!(event_types(&ten_min), vec![GeofenceTransitionType::Inside]);
    }

    #[test]
    fn test_replayed_sample_is_stale() {
        let f = Fixture::new();
        let first = classify(&f.sample(15), &f.result(true), &HashMap::new(), InsideEventPolicy::EverySample);
        let replay = classify(&f.sample(15), &f.result(true), &f.prior(&first), InsideEventPolicy::EverySample);

        assert!(replay.transitions.is_empty());
        assert_eq!(replay.stale, vec![f.geofence_id]);
    }

    #[test]
    fn test_out_of_order_sample_is_ignored() {
        let f = Fixture::new();
        let first = classify(&f.sample(20), &f.result(true), &HashMap::new(), InsideEventPolicy::EverySample);
        let late = classify(&f.sample(10), &f.result(false), &f.prior(&first), InsideEventPolicy::EverySample);

        assert_eq!(late.events().count(), 0);
        assert_eq!(late.stale.len(), 1);
    }

    #[test]
    fn test_event_carries_sample_fields() {
        let f = Fixture::new();
        let s = f.sample(15);
        let out = classify(&s, &f.result(true), &HashMap::new(), InsideEventPolicy::EverySample);
        let event = out.events().next().unwrap();

        assert_eq!(event.tenant_id, f.tenant_id);
        assert_eq!(event.student_id, f.student_id);
        assert_eq!(event.geofence_id, f.geofence_id);
        assert_eq!(event.occurred_at, s.captured_at);
        assert_eq!(event.accuracy, Some(8.0));
        assert!(event.processed_at.is_none());
    }

    #[test]
    fn test_policy_deserialization() {
        let policy: InsideEventPolicy =
            serde_json::from_str(r#"{"mode": "throttled", "interval_secs": 300}"#).unwrap();
        assert_eq!(policy, InsideEventPolicy::Throttled { interval_secs: 300 });

        let policy: InsideEventPolicy = serde_json::from_str(r#"{"mode": "never"}"#).unwrap();
        assert_eq!(policy, InsideEventPolicy::Never);
    }
}
