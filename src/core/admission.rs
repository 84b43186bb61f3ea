//! Pure admission logic.
//!
//! Everything here is a function of an event snapshot, the candidate's
//! memberships and penalty weight, and the current instant. Mutation and
//! locking live in the engine; this module only decides.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use super::model::{Event, GroupId, Pool, PoolId};

/// Tunable admission rules.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    /// Cumulative active penalty weight at which a user becomes ineligible.
    pub penalty_threshold: u32,
    /// Half-width of the bump window around a pool's activation date.
    pub bump_window: Duration,
}

/// How pool activation dates are interpreted during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityMode {
    /// Synchronous attempts: a pool must already be activated.
    Standard,
    /// Correction passes: a pool about to activate also accepts, per
    /// [`is_bump_eligible`].
    BumpWindow,
}

/// Why a candidate was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitlistReason {
    /// Active penalty weight at or above the threshold.
    PenaltyThreshold,
    /// No eligible pool with remaining capacity.
    NoEligiblePool,
}

/// Decision for one candidate against one event snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Admit into this pool.
    Admit(PoolId),
    /// Leave on the waitlist.
    Waitlist(WaitlistReason),
}

/// Whether a pool's activation date is inside the anticipatory bump window
/// at `now`. Holds within `window` of the activation instant on either side;
/// a pool activating further in the future, or one whose activation passed
/// more than `window` ago, is outside.
#[must_use]
pub fn is_bump_eligible(now: DateTime<Utc>, activation_date: DateTime<Utc>, window: Duration) -> bool {
    let offset = activation_date - now;
    -window <= offset && offset <= window
}

fn activation_open(pool: &Pool, now: DateTime<Utc>, mode: EligibilityMode, policy: &AdmissionPolicy) -> bool {
    match mode {
        EligibilityMode::Standard => pool.activation_date <= now,
        // Already-active pools always accept bumps so capacity changes are
        // picked up by the next pass; the window adds anticipatory admission
        // shortly before activation.
        EligibilityMode::BumpWindow => {
            pool.activation_date <= now || is_bump_eligible(now, pool.activation_date, policy.bump_window)
        }
    }
}

/// Decide admission for one candidate.
///
/// Once `now >= merge_time` the pools form a single capacity domain: group
/// membership and activation dates are ignored and any pool with room
/// accepts. Before the merge, a pool is eligible when its permission groups
/// intersect the candidate's memberships and its activation date is open for
/// the given mode. Among eligible pools with room, the one with the earliest
/// activation date wins; ties go to the smallest pool id.
#[must_use]
pub fn evaluate(
    event: &Event,
    pools: &[Pool],
    groups: &HashSet<GroupId>,
    penalty_weight: u32,
    now: DateTime<Utc>,
    policy: &AdmissionPolicy,
    mode: EligibilityMode,
) -> AdmissionDecision {
    if event.heed_penalties && penalty_weight >= policy.penalty_threshold {
        return AdmissionDecision::Waitlist(WaitlistReason::PenaltyThreshold);
    }

    let merged = now >= event.merge_time;
    let chosen = pools
        .iter()
        .filter(|pool| pool.has_room())
        .filter(|pool| {
            merged
                || (!pool.permission_groups.is_disjoint(groups)
                    && activation_open(pool, now, mode, policy))
        })
        .min_by_key(|pool| (pool.activation_date, pool.id));

    match chosen {
        Some(pool) => AdmissionDecision::Admit(pool.id),
        None => AdmissionDecision::Waitlist(WaitlistReason::NoEligiblePool),
    }
}
