//! Per-event state and the keyed lock registry.
//!
//! All admission decisions for a single event serialize on that event's
//! mutex. Lock acquisition is bounded: a configured timeout with a small
//! number of retries, after which the operation fails with a retryable
//! [`EngineError::Contended`] instead of blocking indefinitely.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use super::error::EngineError;
use super::model::{Event, EventId, Pool, PoolId, Registration, RegistrationId, UserId};

/// Mutable state of one event: the event itself, its pools, and every
/// registration ever made against it (withdrawn rows are kept for history).
#[derive(Debug, Clone)]
pub struct EventState {
    /// The event.
    pub event: Event,
    /// Pools in definition order.
    pub pools: Vec<Pool>,
    /// All registrations for the event.
    pub registrations: Vec<Registration>,
}

impl EventState {
    /// Create state for an event with no registrations yet.
    #[must_use]
    pub const fn new(event: Event, pools: Vec<Pool>) -> Self {
        Self {
            event,
            pools,
            registrations: Vec::new(),
        }
    }

    /// Look up a pool by id.
    #[must_use]
    pub fn pool(&self, id: PoolId) -> Option<&Pool> {
        self.pools.iter().find(|p| p.id == id)
    }

    pub(crate) fn pool_mut(&mut self, id: PoolId) -> Option<&mut Pool> {
        self.pools.iter_mut().find(|p| p.id == id)
    }

    /// The registration row for a user, if any. Per-event invariant: at most
    /// one row per user.
    #[must_use]
    pub fn registration_of(&self, user: UserId) -> Option<&Registration> {
        self.registrations.iter().find(|r| r.user_id == user)
    }

    pub(crate) fn index_of_user(&self, user: UserId) -> Option<usize> {
        self.registrations.iter().position(|r| r.user_id == user)
    }

    pub(crate) fn index_of(&self, id: RegistrationId) -> Option<usize> {
        self.registrations.iter().position(|r| r.id == id)
    }

    /// Waitlisted registration indices in priority order: `created_at`
    /// ascending, then assignment sequence.
    pub(crate) fn waiting_indices(&self) -> Vec<usize> {
        let mut waiting: Vec<usize> = (0..self.registrations.len())
            .filter(|&i| self.registrations[i].is_waiting())
            .collect();
        waiting.sort_by_key(|&i| {
            let r = &self.registrations[i];
            (r.created_at, r.sequence)
        });
        waiting
    }

    /// Number of waitlisted registrations.
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.registrations.iter().filter(|r| r.is_waiting()).count()
    }

    /// Number of admitted registrations across all pools.
    #[must_use]
    pub fn number_of_registrations(&self) -> usize {
        self.registrations
            .iter()
            .filter(|r| r.is_admitted())
            .count()
    }

    /// True count of admitted registrations in one pool, recomputed from the
    /// rows rather than the cached counter.
    #[must_use]
    pub fn admitted_count(&self, pool: PoolId) -> u32 {
        let count = self
            .registrations
            .iter()
            .filter(|r| r.pool == Some(pool) && r.is_active())
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Assign a waitlisted registration to a pool and bump the counter, as
    /// one step under the event lock.
    pub(crate) fn commit_admission(&mut self, idx: usize, pool_id: PoolId) {
        debug_assert!(self.registrations[idx].is_waiting());
        self.registrations[idx].pool = Some(pool_id);
        if let Some(pool) = self.pool_mut(pool_id) {
            debug_assert!(pool.registration_count < pool.capacity);
            pool.registration_count += 1;
        }
    }
}

/// One event's lock plus its state.
#[derive(Debug)]
pub struct EventEntry {
    id: EventId,
    state: Mutex<EventState>,
}

impl EventEntry {
    /// Acquire the event lock with a bounded wait, retrying a few times
    /// before giving up with a retryable error.
    pub fn lock_bounded(
        &self,
        timeout: Duration,
        retries: u32,
    ) -> Result<MutexGuard<'_, EventState>, EngineError> {
        for attempt in 0..=retries {
            if let Some(guard) = self.state.try_lock_for(timeout) {
                return Ok(guard);
            }
            tracing::debug!(event = self.id, attempt, "event lock busy");
        }
        Err(EngineError::Contended(self.id))
    }
}

/// Keyed registry of events with per-event mutual exclusion.
#[derive(Debug, Default)]
pub struct EventRegistry {
    events: Mutex<HashMap<EventId, Arc<EventEntry>>>,
    index: Mutex<HashMap<RegistrationId, EventId>>,
    sequence: AtomicU64,
}

impl EventRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new event and its pools.
    pub fn insert(&self, event: Event, pools: Vec<Pool>) -> Result<(), EngineError> {
        let mut events = self.events.lock();
        let id = event.id;
        if events.contains_key(&id) {
            return Err(EngineError::DuplicateEvent(id));
        }
        events.insert(
            id,
            Arc::new(EventEntry {
                id,
                state: Mutex::new(EventState::new(event, pools)),
            }),
        );
        Ok(())
    }

    /// Fetch one event's entry.
    pub fn entry(&self, id: EventId) -> Result<Arc<EventEntry>, EngineError> {
        self.events
            .lock()
            .get(&id)
            .cloned()
            .ok_or(EngineError::UnknownEvent(id))
    }

    /// Snapshot of all entries, for the scheduled passes. Entries are
    /// visited one at a time; a pass never holds two event locks at once.
    #[must_use]
    pub fn entries(&self) -> Vec<(EventId, Arc<EventEntry>)> {
        let mut all: Vec<_> = self
            .events
            .lock()
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(entry)))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    /// Record which event a registration belongs to.
    pub fn bind(&self, registration: RegistrationId, event: EventId) {
        self.index.lock().insert(registration, event);
    }

    /// Resolve a registration id to its event.
    pub fn event_of(&self, registration: RegistrationId) -> Result<EventId, EngineError> {
        self.index
            .lock()
            .get(&registration)
            .copied()
            .ok_or(EngineError::UnknownRegistration(registration))
    }

    /// Next monotonic registration sequence number.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}
