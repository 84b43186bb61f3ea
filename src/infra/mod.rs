//! In-memory adapters for the engine's collaborator traits.

pub mod eligibility;
pub mod payment;

pub use eligibility::InMemoryEligibility;
pub use payment::{ChargeRecord, RecordingGateway};
