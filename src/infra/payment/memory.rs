//! Recording payment gateway.
//!
//! Records every charge and can be switched into a failing mode, so tests
//! can assert both that admitted registrations are charged and that a
//! failing charge never costs a user their slot.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{PaymentError, PaymentGateway, RegistrationId, UserId};

/// One recorded charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRecord {
    /// Registration charged.
    pub registration_id: RegistrationId,
    /// User charged.
    pub user_id: UserId,
    /// Amount in minor units.
    pub amount: u32,
}

/// In-memory gateway that records successful charges.
#[derive(Default)]
pub struct RecordingGateway {
    charges: Mutex<Vec<ChargeRecord>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingGateway {
    /// Create a gateway that accepts every charge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decline every subsequent charge with this message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.fail_with.lock() = Some(message.into());
    }

    /// Accept charges again.
    pub fn succeed(&self) {
        *self.fail_with.lock() = None;
    }

    /// Charges accepted so far, in order.
    #[must_use]
    pub fn charges(&self) -> Vec<ChargeRecord> {
        self.charges.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn charge(
        &self,
        registration: RegistrationId,
        user: UserId,
        amount: u32,
    ) -> Result<(), PaymentError> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Err(PaymentError::Declined(message));
        }
        self.charges.lock().push(ChargeRecord {
            registration_id: registration,
            user_id: user,
            amount,
        });
        Ok(())
    }
}
