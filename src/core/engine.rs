//! The admission engine facade.
//!
//! Owns the event registry and wires the pure admission logic to the
//! collaborators: an [`EligibilitySource`] for memberships and penalty
//! weights, a [`PaymentGateway`] for priced events, an injectable clock,
//! and an optional audit sink. Every mutation of one event's state happens
//! under that event's bounded lock; no lock is ever held across an await,
//! and charging happens strictly after an admission commits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::util::clock::{SharedClock, SystemClock};

use super::admission::{self, AdmissionDecision, EligibilityMode};
use super::audit::{AuditAction, AuditEvent, AuditSink};
use super::consistency::{self, Discrepancy};
use super::corrector;
use super::eligibility::EligibilitySource;
use super::error::EngineError;
use super::model::{
    ChargeStatus, Event, EventId, Pool, PoolId, Registration, RegistrationId, RegistrationOutcome,
    UserId,
};
use super::payment::PaymentGateway;
use super::registry::{EventEntry, EventRegistry, EventState};

/// One admission made by a correction pass, with its event.
#[derive(Debug, Clone)]
pub struct BumpRecord {
    /// Event concerned.
    pub event_id: EventId,
    /// The registration that gained a slot.
    pub registration_id: RegistrationId,
    /// Its user.
    pub user_id: UserId,
    /// The pool it was admitted to.
    pub pool_id: PoolId,
}

/// Admissions made by one correction pass.
#[derive(Debug, Clone, Default)]
pub struct BumpReport {
    /// Every admission the pass made, in the order it was made.
    pub admissions: Vec<BumpRecord>,
}

/// Corrections made by one consistency pass.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyReport {
    /// Every counter correction the pass made.
    pub discrepancies: Vec<Discrepancy>,
}

enum CorrectionKind {
    Bump,
    PenaltyExpiry,
}

struct ChargeDue {
    registration_id: RegistrationId,
    user_id: UserId,
    amount: u32,
}

/// Capacity-constrained registration and pool-admission engine.
pub struct AdmissionEngine<E, G> {
    registry: EventRegistry,
    eligibility: E,
    payments: G,
    clock: SharedClock,
    config: EngineConfig,
    audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
}

impl<E, G> std::fmt::Debug for AdmissionEngine<E, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionEngine").finish_non_exhaustive()
    }
}

impl<E, G> AdmissionEngine<E, G>
where
    E: EligibilitySource,
    G: PaymentGateway,
{
    /// Create an engine with the system clock and no audit sink.
    pub fn new(config: EngineConfig, eligibility: E, payments: G) -> Self {
        Self {
            registry: EventRegistry::new(),
            eligibility,
            payments,
            clock: Arc::new(SystemClock),
            config,
            audit: None,
        }
    }

    /// Replace the clock (tests steer time through this).
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The eligibility collaborator.
    pub const fn eligibility(&self) -> &E {
        &self.eligibility
    }

    /// The payment collaborator.
    pub const fn payments(&self) -> &G {
        &self.payments
    }

    /// Register a new event and its pools.
    pub fn create_event(&self, event: Event, pools: Vec<Pool>) -> Result<(), EngineError> {
        let id = event.id;
        self.registry.insert(event, pools)?;
        tracing::info!(event = id, "event created");
        Ok(())
    }

    /// Change a pool's capacity. Takes effect on the next admission
    /// evaluation; shrinking never evicts existing admits.
    pub fn set_pool_capacity(
        &self,
        event_id: EventId,
        pool_id: PoolId,
        capacity: u32,
    ) -> Result<(), EngineError> {
        self.with_pool(event_id, pool_id, |pool| pool.capacity = capacity)
    }

    /// Move a pool's activation date.
    pub fn set_pool_activation(
        &self,
        event_id: EventId,
        pool_id: PoolId,
        activation_date: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.with_pool(event_id, pool_id, |pool| {
            pool.activation_date = activation_date;
        })
    }

    /// Move an event's merge time.
    pub fn set_merge_time(
        &self,
        event_id: EventId,
        merge_time: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let entry = self.registry.entry(event_id)?;
        let mut state = self.lock(&entry)?;
        state.event.merge_time = merge_time;
        Ok(())
    }

    /// Cloned snapshot of one event's state, for inspection.
    pub fn event_snapshot(&self, event_id: EventId) -> Result<EventState, EngineError> {
        let entry = self.registry.entry(event_id)?;
        let state = self.lock(&entry)?;
        Ok(state.clone())
    }

    /// Cloned registration row.
    pub fn registration(&self, registration_id: RegistrationId) -> Result<Registration, EngineError> {
        let event_id = self.registry.event_of(registration_id)?;
        let entry = self.registry.entry(event_id)?;
        let state = self.lock(&entry)?;
        state
            .index_of(registration_id)
            .map(|idx| state.registrations[idx].clone())
            .ok_or(EngineError::UnknownRegistration(registration_id))
    }

    /// Attempt to register a user for an event.
    ///
    /// Admission follows the standard rules: merged capacity after the merge
    /// time, otherwise group-eligible activated pools, penalty threshold,
    /// earliest-activation pool with room. No eligible pool with room means
    /// the registration is waitlisted, which is a normal outcome, not an
    /// error. A user who previously unregistered re-enters at the back of
    /// the line on the same registration row.
    pub async fn attempt_registration(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<RegistrationOutcome, EngineError> {
        let now = self.clock.now();
        let entry = self.registry.entry(event_id)?;

        let (registration_id, pool_id, charge) = {
            let mut state = self.lock(&entry)?;
            if now >= state.event.start_time {
                return Err(EngineError::RegistrationClosed(event_id));
            }
            if let Some(existing) = state.registration_of(user_id) {
                if existing.is_active() {
                    return Err(EngineError::AlreadyRegistered(event_id));
                }
            }

            let groups = self.eligibility.groups_of(user_id);
            let weight = self.eligibility.active_penalty_weight(user_id, now);
            let decision = admission::evaluate(
                &state.event,
                &state.pools,
                &groups,
                weight,
                now,
                &self.config.policy(),
                EligibilityMode::Standard,
            );

            let sequence = self.registry.next_sequence();
            let idx = match state.index_of_user(user_id) {
                Some(idx) => {
                    let row = &mut state.registrations[idx];
                    row.pool = None;
                    row.created_at = now;
                    row.sequence = sequence;
                    row.charge_status = ChargeStatus::NotCharged;
                    row.unregistration_date = None;
                    idx
                }
                None => {
                    state.registrations.push(Registration {
                        id: Uuid::new_v4(),
                        event_id,
                        user_id,
                        pool: None,
                        created_at: now,
                        sequence,
                        charge_status: ChargeStatus::NotCharged,
                        unregistration_date: None,
                    });
                    state.registrations.len() - 1
                }
            };
            let registration_id = state.registrations[idx].id;
            // Bind under the event lock so the returned id resolves for
            // unregister and lookups the moment the caller sees it.
            self.registry.bind(registration_id, event_id);
            self.audit(
                AuditAction::Register,
                now,
                event_id,
                Some(registration_id),
                Some(user_id),
                None,
                None,
            );

            match decision {
                AdmissionDecision::Admit(pool_id) => {
                    state.commit_admission(idx, pool_id);
                    tracing::info!(
                        event = event_id,
                        user = user_id,
                        pool = pool_id,
                        "registration admitted"
                    );
                    self.audit(
                        AuditAction::Admit,
                        now,
                        event_id,
                        Some(registration_id),
                        Some(user_id),
                        Some(pool_id),
                        None,
                    );
                    let charge = state.event.price.map(|amount| ChargeDue {
                        registration_id,
                        user_id,
                        amount,
                    });
                    (registration_id, Some(pool_id), charge)
                }
                AdmissionDecision::Waitlist(reason) => {
                    tracing::info!(
                        event = event_id,
                        user = user_id,
                        ?reason,
                        "registration waitlisted"
                    );
                    self.audit(
                        AuditAction::Waitlist,
                        now,
                        event_id,
                        Some(registration_id),
                        Some(user_id),
                        None,
                        Some(format!("{reason:?}")),
                    );
                    (registration_id, None, None)
                }
            }
        };

        let charge_status = match charge {
            Some(due) => self
                .settle_charges(&entry, event_id, vec![due])
                .await
                .pop()
                .map_or(ChargeStatus::NotCharged, |(_, status)| status),
            None => ChargeStatus::NotCharged,
        };

        Ok(RegistrationOutcome {
            registration_id,
            admitted: pool_id.is_some(),
            pool_id,
            charge_status,
        })
    }

    /// Withdraw a registration.
    ///
    /// Sets the unregistration date and, when the registration held a pool
    /// slot on an event that has not started, frees the slot and immediately
    /// re-evaluates the waitlist against it.
    pub async fn unregister(&self, registration_id: RegistrationId) -> Result<(), EngineError> {
        let now = self.clock.now();
        let event_id = self.registry.event_of(registration_id)?;
        let entry = self.registry.entry(event_id)?;

        let charges = {
            let mut state = self.lock(&entry)?;
            let idx = state
                .index_of(registration_id)
                .ok_or(EngineError::UnknownRegistration(registration_id))?;
            if !state.registrations[idx].is_active() {
                return Err(EngineError::AlreadyUnregistered(registration_id));
            }

            let freed = state.registrations[idx].pool.take();
            state.registrations[idx].unregistration_date = Some(now);
            let user_id = state.registrations[idx].user_id;
            tracing::info!(event = event_id, user = user_id, "registration withdrawn");
            self.audit(
                AuditAction::Unregister,
                now,
                event_id,
                Some(registration_id),
                Some(user_id),
                freed,
                None,
            );

            let mut charges = Vec::new();
            if let Some(pool_id) = freed {
                if let Some(pool) = state.pool_mut(pool_id) {
                    pool.registration_count = pool.registration_count.saturating_sub(1);
                }
                if state.event.start_time > now {
                    let bumped = corrector::bump_pass(
                        &mut state,
                        &self.eligibility,
                        &self.config.policy(),
                        now,
                        EligibilityMode::Standard,
                    );
                    let price = state.event.price;
                    for bump in &bumped {
                        self.audit(
                            AuditAction::Bump,
                            now,
                            event_id,
                            Some(bump.registration_id),
                            Some(bump.user_id),
                            Some(bump.pool_id),
                            None,
                        );
                        if let Some(amount) = price {
                            charges.push(ChargeDue {
                                registration_id: bump.registration_id,
                                user_id: bump.user_id,
                                amount,
                            });
                        }
                    }
                }
            }
            charges
        };

        self.settle_charges(&entry, event_id, charges).await;
        Ok(())
    }

    /// Re-evaluate every future event's waitlist in priority order,
    /// admitting into pools that are activated or inside the bump window.
    /// Idempotent: with no state change between runs, a second run admits
    /// nothing further. Safe to call on a schedule or manually.
    pub async fn run_waitlist_bump(&self) -> BumpReport {
        self.run_correction(CorrectionKind::Bump).await
    }

    /// Admit from each future event's waitlist head while eligibility
    /// (restored by penalty expiry) and capacity allow. Head-only so nobody
    /// overtakes an earlier-queued registration. Safe to call on a schedule,
    /// manually, or whenever a penalty expiry is detected.
    pub async fn run_penalty_expiry_check(&self) -> BumpReport {
        self.run_correction(CorrectionKind::PenaltyExpiry).await
    }

    /// Reconcile every pool's cached counter against the true count of
    /// admitted registrations, correcting and reporting drift.
    pub fn run_consistency_check(&self) -> ConsistencyReport {
        let now = self.clock.now();
        let mut report = ConsistencyReport::default();
        for (event_id, entry) in self.registry.entries() {
            match self.lock(&entry) {
                Ok(mut state) => {
                    let corrected = consistency::reconcile(&mut state);
                    for discrepancy in &corrected {
                        self.audit(
                            AuditAction::DriftCorrected,
                            now,
                            event_id,
                            None,
                            None,
                            Some(discrepancy.pool_id),
                            Some(format!(
                                "cached {} actual {}",
                                discrepancy.cached, discrepancy.actual
                            )),
                        );
                    }
                    report.discrepancies.extend(corrected);
                }
                Err(err) => {
                    tracing::warn!(
                        event = event_id,
                        error = %err,
                        "skipping contended event in consistency pass"
                    );
                }
            }
        }
        report
    }

    async fn run_correction(&self, kind: CorrectionKind) -> BumpReport {
        let now = self.clock.now();
        let policy = self.config.policy();
        let mut report = BumpReport::default();

        for (event_id, entry) in self.registry.entries() {
            let (bumped, charges) = {
                let mut state = match self.lock(&entry) {
                    Ok(state) => state,
                    Err(err) => {
                        tracing::warn!(
                            event = event_id,
                            error = %err,
                            "skipping contended event in correction pass"
                        );
                        continue;
                    }
                };
                if state.event.start_time <= now || state.waiting_count() == 0 {
                    continue;
                }

                let bumped = match kind {
                    CorrectionKind::Bump => corrector::bump_pass(
                        &mut state,
                        &self.eligibility,
                        &policy,
                        now,
                        EligibilityMode::BumpWindow,
                    ),
                    CorrectionKind::PenaltyExpiry => {
                        corrector::penalty_expiry_pass(&mut state, &self.eligibility, &policy, now)
                    }
                };

                let price = state.event.price;
                let mut charges = Vec::new();
                for bump in &bumped {
                    self.audit(
                        AuditAction::Bump,
                        now,
                        event_id,
                        Some(bump.registration_id),
                        Some(bump.user_id),
                        Some(bump.pool_id),
                        None,
                    );
                    if let Some(amount) = price {
                        charges.push(ChargeDue {
                            registration_id: bump.registration_id,
                            user_id: bump.user_id,
                            amount,
                        });
                    }
                }
                (bumped, charges)
            };

            self.settle_charges(&entry, event_id, charges).await;
            report
                .admissions
                .extend(bumped.into_iter().map(|bump| BumpRecord {
                    event_id,
                    registration_id: bump.registration_id,
                    user_id: bump.user_id,
                    pool_id: bump.pool_id,
                }));
        }
        report
    }

    /// Charge each due registration, then record statuses in one short
    /// critical section. Admission already stands; a failed charge or a
    /// contended status write never unwinds it.
    async fn settle_charges(
        &self,
        entry: &EventEntry,
        event_id: EventId,
        due: Vec<ChargeDue>,
    ) -> Vec<(RegistrationId, ChargeStatus)> {
        if due.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::with_capacity(due.len());
        for item in due {
            let status = match self
                .payments
                .charge(item.registration_id, item.user_id, item.amount)
                .await
            {
                Ok(()) => ChargeStatus::Succeeded,
                Err(err) => {
                    tracing::warn!(
                        event = event_id,
                        user = item.user_id,
                        error = %err,
                        "charge failed after admission"
                    );
                    self.audit(
                        AuditAction::ChargeFailed,
                        self.clock.now(),
                        event_id,
                        Some(item.registration_id),
                        Some(item.user_id),
                        None,
                        Some(err.to_string()),
                    );
                    ChargeStatus::Failed(err.to_string())
                }
            };
            results.push((item.registration_id, status));
        }

        match self.lock(entry) {
            Ok(mut state) => {
                for (registration_id, status) in &results {
                    if let Some(idx) = state.index_of(*registration_id) {
                        state.registrations[idx].charge_status = status.clone();
                    }
                }
            }
            Err(err) => {
                tracing::error!(
                    event = event_id,
                    error = %err,
                    "could not record charge statuses"
                );
            }
        }
        results
    }

    fn with_pool(
        &self,
        event_id: EventId,
        pool_id: PoolId,
        mutate: impl FnOnce(&mut Pool),
    ) -> Result<(), EngineError> {
        let entry = self.registry.entry(event_id)?;
        let mut state = self.lock(&entry)?;
        let pool = state
            .pool_mut(pool_id)
            .ok_or(EngineError::UnknownPool { event_id, pool_id })?;
        mutate(pool);
        Ok(())
    }

    fn lock<'a>(
        &self,
        entry: &'a EventEntry,
    ) -> Result<parking_lot::MutexGuard<'a, EventState>, EngineError> {
        entry.lock_bounded(self.config.lock_timeout(), self.config.lock_retries)
    }

    #[allow(clippy::too_many_arguments)]
    fn audit(
        &self,
        action: AuditAction,
        at: DateTime<Utc>,
        event_id: EventId,
        registration_id: Option<RegistrationId>,
        user_id: Option<UserId>,
        pool_id: Option<PoolId>,
        detail: Option<String>,
    ) {
        if let Some(sink) = &self.audit {
            sink.lock().record(AuditEvent {
                action,
                event_id,
                registration_id,
                user_id,
                pool_id,
                at,
                detail,
            });
        }
    }
}
