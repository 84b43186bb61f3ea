//! Domain model: events, pools, registrations, and penalties.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event identifier.
pub type EventId = u64;
/// Pool identifier. Ordering matters: the smaller id wins admission
/// tie-breaks between pools with identical activation dates.
pub type PoolId = u64;
/// User identifier.
pub type UserId = u64;
/// Membership group identifier.
pub type GroupId = u64;
/// Registration identifier.
pub type RegistrationId = Uuid;

/// An event users register for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Identifier.
    pub id: EventId,
    /// Human-readable title.
    pub title: String,
    /// Instant the event starts. Registration closes at this point and
    /// correction passes stop touching the event.
    pub start_time: DateTime<Utc>,
    /// Instant after which all pools merge into a single eligibility and
    /// capacity domain.
    pub merge_time: DateTime<Utc>,
    /// Whether active penalties block admission.
    pub heed_penalties: bool,
    /// Price in minor currency units. Priced events trigger a charge after
    /// admission; `None` means free.
    pub price: Option<u32>,
}

/// Capacity bucket accepting a subset of eligible registrants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    /// Identifier.
    pub id: PoolId,
    /// Human-readable name.
    pub name: String,
    /// Maximum number of admitted registrations.
    pub capacity: u32,
    /// Instant after which the pool accepts registrations.
    pub activation_date: DateTime<Utc>,
    /// Groups whose members may be admitted to this pool.
    pub permission_groups: HashSet<GroupId>,
    /// Cached count of admitted registrations. Must equal the true count of
    /// registrations pointing at this pool with no unregistration date, and
    /// never exceed `capacity` at a committed state.
    pub registration_count: u32,
}

impl Pool {
    /// Remaining admission slots.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.registration_count)
    }

    /// Whether the pool can accept another admission.
    #[must_use]
    pub const fn has_room(&self) -> bool {
        self.registration_count < self.capacity
    }
}

/// Outcome of a payment attempt for a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeStatus {
    /// No charge has been attempted.
    NotCharged,
    /// The charge went through.
    Succeeded,
    /// The charge failed with the gateway's reason. Admission is unaffected.
    Failed(String),
}

/// A user's claim on an event.
///
/// `pool = Some(_)` means admitted, `pool = None` with no unregistration
/// date means waitlisted, and a set `unregistration_date` means withdrawn.
/// Rows are kept after withdrawal for audit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    /// Identifier.
    pub id: RegistrationId,
    /// Event this claim belongs to.
    pub event_id: EventId,
    /// Registering user.
    pub user_id: UserId,
    /// Admitting pool, if admitted.
    pub pool: Option<PoolId>,
    /// Creation instant; earlier wins waitlist priority.
    pub created_at: DateTime<Utc>,
    /// Registry-assigned monotonic tie-break so waitlist order is total even
    /// when two registrations share a creation instant.
    pub sequence: u64,
    /// Payment outcome for priced events.
    pub charge_status: ChargeStatus,
    /// Withdrawal instant, if the user unregistered.
    pub unregistration_date: Option<DateTime<Utc>>,
}

impl Registration {
    /// Whether this claim is still live (admitted or waitlisted).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.unregistration_date.is_none()
    }

    /// Whether this claim currently holds a pool slot.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        self.pool.is_some() && self.is_active()
    }

    /// Whether this claim is waiting for a pool slot.
    #[must_use]
    pub const fn is_waiting(&self) -> bool {
        self.pool.is_none() && self.is_active()
    }
}

/// A penalty on a user, counting against admission while active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Penalty {
    /// Penalized user.
    pub user_id: UserId,
    /// Weight contributed while active.
    pub weight: u32,
    /// Instant the penalty was issued.
    pub created_at: DateTime<Utc>,
    /// Event the penalty originated from.
    pub source_event: EventId,
    /// Why the penalty was issued.
    pub reason: String,
}

impl Penalty {
    /// Whether the penalty still counts at `now`, given the validity window.
    /// Activity is a pure function of time; it is never cached.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>, validity: Duration) -> bool {
        now - self.created_at < validity
    }
}

/// Result of a registration attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    /// The registration that was created or reactivated.
    pub registration_id: RegistrationId,
    /// Whether the registration was admitted to a pool.
    pub admitted: bool,
    /// The admitting pool, when admitted.
    pub pool_id: Option<PoolId>,
    /// Payment outcome, for priced events.
    pub charge_status: ChargeStatus,
}
