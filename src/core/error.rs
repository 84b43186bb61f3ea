//! Error types for admission operations.

use thiserror::Error;

use super::model::{EventId, PoolId, RegistrationId};

/// Errors produced by the admission engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No event with this identifier exists.
    #[error("unknown event: {0}")]
    UnknownEvent(EventId),
    /// An event with this identifier already exists.
    #[error("duplicate event: {0}")]
    DuplicateEvent(EventId),
    /// The event has no pool with this identifier.
    #[error("unknown pool {pool_id} for event {event_id}")]
    UnknownPool {
        /// Event that was looked up.
        event_id: EventId,
        /// Missing pool identifier.
        pool_id: PoolId,
    },
    /// No registration with this identifier exists.
    #[error("unknown registration: {0}")]
    UnknownRegistration(RegistrationId),
    /// The user already holds a live registration for the event.
    #[error("user already registered for event {0}")]
    AlreadyRegistered(EventId),
    /// The registration was already withdrawn.
    #[error("registration already unregistered: {0}")]
    AlreadyUnregistered(RegistrationId),
    /// The event has started; registration is closed.
    #[error("registration closed for event {0}")]
    RegistrationClosed(EventId),
    /// The per-event lock could not be acquired within the bounded wait.
    /// Transient; the caller may retry.
    #[error("event {0} is contended, retry later")]
    Contended(EventId),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether the caller may simply retry the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Contended(_))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
