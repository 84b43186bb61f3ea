//! Payment adapters.

pub mod memory;

pub use memory::{ChargeRecord, RecordingGateway};
