//! In-memory eligibility source.
//!
//! Holds group memberships and issued penalties behind mutexes so tests and
//! single-process deployments can mutate them while an engine reads them.
//! Penalty weights are summed over penalties still inside the validity
//! window at the time of the query; expiry needs no sweep.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::core::{EligibilitySource, GroupId, Penalty, UserId};

/// Mutable in-memory group memberships and penalties.
pub struct InMemoryEligibility {
    validity: Duration,
    memberships: Mutex<HashMap<UserId, HashSet<GroupId>>>,
    penalties: Mutex<Vec<Penalty>>,
}

impl InMemoryEligibility {
    /// Create a source where penalties stay active for `validity`.
    #[must_use]
    pub fn new(validity: Duration) -> Self {
        Self {
            validity,
            memberships: Mutex::new(HashMap::new()),
            penalties: Mutex::new(Vec::new()),
        }
    }

    /// Add a user to a group.
    pub fn add_member(&self, user: UserId, group: GroupId) {
        self.memberships.lock().entry(user).or_default().insert(group);
    }

    /// Remove a user from a group.
    pub fn remove_member(&self, user: UserId, group: GroupId) {
        if let Some(groups) = self.memberships.lock().get_mut(&user) {
            groups.remove(&group);
        }
    }

    /// Issue a penalty.
    pub fn add_penalty(&self, penalty: Penalty) {
        tracing::debug!(
            user = penalty.user_id,
            weight = penalty.weight,
            "penalty issued"
        );
        self.penalties.lock().push(penalty);
    }

    /// All penalties ever issued to a user, active or expired.
    #[must_use]
    pub fn penalties_of(&self, user: UserId) -> Vec<Penalty> {
        self.penalties
            .lock()
            .iter()
            .filter(|p| p.user_id == user)
            .cloned()
            .collect()
    }
}

impl EligibilitySource for InMemoryEligibility {
    fn groups_of(&self, user: UserId) -> HashSet<GroupId> {
        self.memberships.lock().get(&user).cloned().unwrap_or_default()
    }

    fn active_penalty_weight(&self, user: UserId, now: DateTime<Utc>) -> u32 {
        self.penalties
            .lock()
            .iter()
            .filter(|p| p.user_id == user && p.is_active(now, self.validity))
            .map(|p| p.weight)
            .sum()
    }
}
