//! Eligibility collaborator consumed by the admission engine.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::model::{GroupId, UserId};

/// Supplies a user's current group memberships and active penalty weight at
/// evaluation time. The engine consumes this; it never owns or caches the
/// answers, so penalty expiry takes effect on the next evaluation.
pub trait EligibilitySource: Send + Sync + 'static {
    /// Groups the user currently belongs to.
    fn groups_of(&self, user: UserId) -> HashSet<GroupId>;

    /// Sum of weights of the user's non-expired penalties at `now`.
    fn active_penalty_weight(&self, user: UserId, now: DateTime<Utc>) -> u32;
}
