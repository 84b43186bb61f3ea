//! Pool counter reconciliation.
//!
//! The cached `registration_count` on each pool must equal the true count of
//! admitted, non-withdrawn registrations. Drift signals a bug elsewhere, so
//! every correction is reported and logged at warning level; it is never
//! fatal and never silent.

use super::model::{EventId, PoolId};
use super::registry::EventState;

/// One corrected counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    /// Event owning the pool.
    pub event_id: EventId,
    /// Pool whose counter drifted.
    pub pool_id: PoolId,
    /// Cached value before correction.
    pub cached: u32,
    /// True count the cache was corrected to.
    pub actual: u32,
}

/// Recompute every pool's true admitted count and correct the cache where it
/// differs, returning each correction made.
pub fn reconcile(state: &mut EventState) -> Vec<Discrepancy> {
    let actuals: Vec<u32> = state
        .pools
        .iter()
        .map(|pool| state.admitted_count(pool.id))
        .collect();

    let event_id = state.event.id;
    let mut corrected = Vec::new();
    for (pool, actual) in state.pools.iter_mut().zip(actuals) {
        if pool.registration_count == actual {
            continue;
        }
        tracing::warn!(
            event = event_id,
            pool = pool.id,
            cached = pool.registration_count,
            actual,
            "pool counter drift corrected"
        );
        corrected.push(Discrepancy {
            event_id,
            pool_id: pool.id,
            cached: pool.registration_count,
            actual,
        });
        pool.registration_count = actual;
    }
    corrected
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::core::model::{ChargeStatus, Event, Pool, Registration};

    fn drifted_state() -> EventState {
        let now = Utc::now();
        let event = Event {
            id: 5,
            title: "t".into(),
            start_time: now + Duration::days(1),
            merge_time: now + Duration::hours(12),
            heed_penalties: false,
            price: None,
        };
        let pool = Pool {
            id: 1,
            name: "p".into(),
            capacity: 5,
            activation_date: now,
            permission_groups: HashSet::from([1]),
            registration_count: 4, // true count below is 2
        };
        let mut state = EventState::new(event, vec![pool]);
        for (seq, unregistered) in [(0u64, false), (1, false), (2, true)] {
            state.registrations.push(Registration {
                id: Uuid::new_v4(),
                event_id: 5,
                user_id: seq,
                pool: Some(1),
                created_at: now,
                sequence: seq,
                charge_status: ChargeStatus::NotCharged,
                unregistration_date: unregistered.then_some(now),
            });
        }
        state
    }

    #[test]
    fn drift_is_corrected_and_reported() {
        let mut state = drifted_state();
        let corrected = reconcile(&mut state);
        assert_eq!(
            corrected,
            vec![Discrepancy {
                event_id: 5,
                pool_id: 1,
                cached: 4,
                actual: 2,
            }]
        );
        assert_eq!(state.pool(1).unwrap().registration_count, 2);
    }

    #[test]
    fn clean_state_reports_nothing() {
        let mut state = drifted_state();
        state.pool_mut(1).unwrap().registration_count = 2;
        assert!(reconcile(&mut state).is_empty());
    }
}
