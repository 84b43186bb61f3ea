//! Audit sink for admission decisions.
//!
//! Every state transition the engine makes (registration, admission,
//! waitlisting, bumps, withdrawals, charge failures, counter corrections)
//! can be recorded to a pluggable sink alongside tracing output.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::model::{EventId, PoolId, RegistrationId, UserId};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// A registration attempt arrived.
    Register,
    /// A registration was admitted to a pool.
    Admit,
    /// A registration was placed on the waitlist.
    Waitlist,
    /// A waitlisted registration was bumped into a pool.
    Bump,
    /// A registration was withdrawn.
    Unregister,
    /// A charge for an admitted registration failed.
    ChargeFailed,
    /// A pool counter drifted from the true count and was corrected.
    DriftCorrected,
}

/// One audit record.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// What happened.
    pub action: AuditAction,
    /// Event concerned.
    pub event_id: EventId,
    /// Registration concerned, when one is involved.
    pub registration_id: Option<RegistrationId>,
    /// User concerned, when one is involved.
    pub user_id: Option<UserId>,
    /// Pool concerned, when one is involved.
    pub pool_id: Option<PoolId>,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Additional context (waitlist reason, charge failure message, drift
    /// numbers).
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink with a bounded buffer, for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a sink keeping at most `max_events` records.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}
