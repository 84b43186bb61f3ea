//! Core admission logic and per-event state.

pub mod admission;
pub mod audit;
pub mod consistency;
pub mod corrector;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod model;
pub mod payment;
pub mod registry;

pub use admission::{AdmissionDecision, AdmissionPolicy, EligibilityMode, WaitlistReason};
pub use audit::{AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use consistency::Discrepancy;
pub use eligibility::EligibilitySource;
pub use engine::{AdmissionEngine, BumpRecord, BumpReport, ConsistencyReport};
pub use error::{AppResult, EngineError};
pub use model::{
    ChargeStatus, Event, EventId, GroupId, Penalty, Pool, PoolId, Registration, RegistrationId,
    RegistrationOutcome, UserId,
};
pub use payment::{PaymentError, PaymentGateway};
pub use registry::{EventRegistry, EventState};
