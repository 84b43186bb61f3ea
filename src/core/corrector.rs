//! Waitlist correction passes over a single event's state.
//!
//! Both passes walk the waitlist in priority order and re-apply the
//! admission rules; they differ in eligibility mode and in whether an
//! ineligible registration blocks the ones behind it. The engine wraps
//! these with the per-event lock and drives them from the scheduler.

use chrono::{DateTime, Utc};

use super::admission::{self, AdmissionDecision, AdmissionPolicy, EligibilityMode};
use super::eligibility::EligibilitySource;
use super::model::{PoolId, RegistrationId, UserId};
use super::registry::EventState;

/// One admission made by a correction pass.
#[derive(Debug, Clone)]
pub struct Bumped {
    /// The registration that gained a slot.
    pub registration_id: RegistrationId,
    /// Its user.
    pub user_id: UserId,
    /// The pool it was admitted to.
    pub pool_id: PoolId,
}

/// Walk the waitlist in priority order and admit every registration an
/// eligible pool with room will take, using the given eligibility mode.
/// Ineligible registrations are skipped and never block later ones, so
/// within a pass an earlier registration is always admitted before a later
/// one competing for the same pool. Running the pass again with no state
/// change admits nothing further.
pub fn bump_pass<E>(
    state: &mut EventState,
    eligibility: &E,
    policy: &AdmissionPolicy,
    now: DateTime<Utc>,
    mode: EligibilityMode,
) -> Vec<Bumped>
where
    E: EligibilitySource + ?Sized,
{
    let mut admitted = Vec::new();
    for idx in state.waiting_indices() {
        let user = state.registrations[idx].user_id;
        let groups = eligibility.groups_of(user);
        let weight = eligibility.active_penalty_weight(user, now);
        let decision = admission::evaluate(
            &state.event,
            &state.pools,
            &groups,
            weight,
            now,
            policy,
            mode,
        );
        if let AdmissionDecision::Admit(pool_id) = decision {
            state.commit_admission(idx, pool_id);
            let registration = &state.registrations[idx];
            tracing::info!(
                event = state.event.id,
                user,
                pool = pool_id,
                "waitlisted registration bumped"
            );
            admitted.push(Bumped {
                registration_id: registration.id,
                user_id: user,
                pool_id,
            });
        }
    }
    admitted
}

/// Admit from the head of the waitlist only, with standard eligibility.
///
/// Used when a penalty expiry may have restored a user's eligibility: the
/// restored user is admitted only while first-in-line among still-waitlisted
/// registrations, so nobody overtakes an earlier-queued user. The loop
/// continues as long as the head keeps getting admitted.
pub fn penalty_expiry_pass<E>(
    state: &mut EventState,
    eligibility: &E,
    policy: &AdmissionPolicy,
    now: DateTime<Utc>,
) -> Vec<Bumped>
where
    E: EligibilitySource + ?Sized,
{
    let mut admitted = Vec::new();
    loop {
        let Some(&head) = state.waiting_indices().first() else {
            break;
        };
        let user = state.registrations[head].user_id;
        let groups = eligibility.groups_of(user);
        let weight = eligibility.active_penalty_weight(user, now);
        let decision = admission::evaluate(
            &state.event,
            &state.pools,
            &groups,
            weight,
            now,
            policy,
            EligibilityMode::Standard,
        );
        let AdmissionDecision::Admit(pool_id) = decision else {
            break;
        };
        state.commit_admission(head, pool_id);
        let registration = &state.registrations[head];
        tracing::info!(
            event = state.event.id,
            user,
            pool = pool_id,
            "head of waitlist admitted after eligibility change"
        );
        admitted.push(Bumped {
            registration_id: registration.id,
            user_id: user,
            pool_id,
        });
    }
    admitted
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use chrono::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::core::model::{ChargeStatus, Event, GroupId, Pool, Registration};

    struct FixedEligibility {
        groups: HashMap<UserId, HashSet<GroupId>>,
        weights: HashMap<UserId, u32>,
    }

    impl EligibilitySource for FixedEligibility {
        fn groups_of(&self, user: UserId) -> HashSet<GroupId> {
            self.groups.get(&user).cloned().unwrap_or_default()
        }

        fn active_penalty_weight(&self, user: UserId, _now: DateTime<Utc>) -> u32 {
            self.weights.get(&user).copied().unwrap_or(0)
        }
    }

    fn policy() -> AdmissionPolicy {
        AdmissionPolicy {
            penalty_threshold: 3,
            bump_window: Duration::minutes(35),
        }
    }

    fn state(now: DateTime<Utc>, pools: Vec<Pool>, users: &[UserId]) -> EventState {
        let event = Event {
            id: 1,
            title: "t".into(),
            start_time: now + Duration::days(1),
            merge_time: now + Duration::hours(12),
            heed_penalties: true,
            price: None,
        };
        let mut state = EventState::new(event, pools);
        for (seq, &user) in users.iter().enumerate() {
            state.registrations.push(Registration {
                id: Uuid::new_v4(),
                event_id: 1,
                user_id: user,
                pool: None,
                created_at: now,
                sequence: seq as u64,
                charge_status: ChargeStatus::NotCharged,
                unregistration_date: None,
            });
        }
        state
    }

    fn pool(id: PoolId, capacity: u32, activation: DateTime<Utc>, group: GroupId) -> Pool {
        Pool {
            id,
            name: format!("pool-{id}"),
            capacity,
            activation_date: activation,
            permission_groups: HashSet::from([group]),
            registration_count: 0,
        }
    }

    #[test]
    fn bump_pass_skips_ineligible_without_blocking() {
        let now = Utc::now();
        // User 10 lacks the group; user 20 behind them should still bump.
        let mut state = state(now, vec![pool(1, 2, now - Duration::hours(1), 7)], &[10, 20]);
        let eligibility = FixedEligibility {
            groups: HashMap::from([(20, HashSet::from([7]))]),
            weights: HashMap::new(),
        };

        let admitted = bump_pass(
            &mut state,
            &eligibility,
            &policy(),
            now,
            EligibilityMode::BumpWindow,
        );
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].user_id, 20);
        assert_eq!(state.waiting_count(), 1);
    }

    #[test]
    fn bump_pass_respects_capacity_in_fifo_order() {
        let now = Utc::now();
        let mut state = state(
            now,
            vec![pool(1, 2, now + Duration::minutes(20), 7)],
            &[10, 20, 30],
        );
        let all = HashSet::from([7]);
        let eligibility = FixedEligibility {
            groups: HashMap::from([(10, all.clone()), (20, all.clone()), (30, all)]),
            weights: HashMap::new(),
        };

        let admitted = bump_pass(
            &mut state,
            &eligibility,
            &policy(),
            now,
            EligibilityMode::BumpWindow,
        );
        let users: Vec<UserId> = admitted.iter().map(|b| b.user_id).collect();
        assert_eq!(users, vec![10, 20]);
        assert_eq!(state.pool(1).unwrap().registration_count, 2);

        // Idempotent: nothing changed, nothing more is admitted.
        let again = bump_pass(
            &mut state,
            &eligibility,
            &policy(),
            now,
            EligibilityMode::BumpWindow,
        );
        assert!(again.is_empty());
    }

    #[test]
    fn penalty_pass_stops_at_blocked_head() {
        let now = Utc::now();
        // Head user 10 still carries the full penalty weight; user 20 behind
        // them is clean but must not overtake.
        let mut state = state(now, vec![pool(1, 2, now - Duration::hours(1), 7)], &[10, 20]);
        let all = HashSet::from([7]);
        let eligibility = FixedEligibility {
            groups: HashMap::from([(10, all.clone()), (20, all)]),
            weights: HashMap::from([(10, 3)]),
        };

        let admitted = penalty_expiry_pass(&mut state, &eligibility, &policy(), now);
        assert!(admitted.is_empty());
        assert_eq!(state.waiting_count(), 2);
    }

    #[test]
    fn penalty_pass_drains_eligible_heads() {
        let now = Utc::now();
        let mut state = state(now, vec![pool(1, 2, now - Duration::hours(1), 7)], &[10, 20]);
        let all = HashSet::from([7]);
        let eligibility = FixedEligibility {
            groups: HashMap::from([(10, all.clone()), (20, all)]),
            weights: HashMap::new(),
        };

        let admitted = penalty_expiry_pass(&mut state, &eligibility, &policy(), now);
        let users: Vec<UserId> = admitted.iter().map(|b| b.user_id).collect();
        assert_eq!(users, vec![10, 20]);
        assert_eq!(state.waiting_count(), 0);
    }
}
