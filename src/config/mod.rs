//! Configuration models for admission policy, locking, and scheduling.

pub mod engine;

pub use engine::EngineConfig;
