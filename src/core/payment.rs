//! Payment collaborator: an opaque charge capability.
//!
//! Admission and payment are decoupled. The engine charges after an
//! admission commits, outside the event lock; a failed charge is recorded
//! on the registration and surfaced to the caller but never revokes the
//! pool slot.

use async_trait::async_trait;
use thiserror::Error;

use super::model::{RegistrationId, UserId};

/// Errors a payment gateway can report.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The gateway refused the charge.
    #[error("charge declined: {0}")]
    Declined(String),
    /// The gateway could not be reached.
    #[error("payment backend unavailable: {0}")]
    Unavailable(String),
}

/// Charges users for admitted registrations to priced events.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Charge `amount` minor units for an admitted registration.
    async fn charge(
        &self,
        registration: RegistrationId,
        user: UserId,
        amount: u32,
    ) -> Result<(), PaymentError>;
}
