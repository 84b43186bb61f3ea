//! Eligibility adapters.

pub mod memory;

pub use memory::InMemoryEligibility;
