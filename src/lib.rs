//! # Eventpool
//!
//! A capacity-constrained event registration engine with pooled admission,
//! FIFO waitlists, and penalty-aware eligibility.
//!
//! Registrations for an event compete for slots in one or more pools, each
//! with its own capacity, activation date, and permission groups. A user
//! the rules admit gets a pool slot immediately; everyone else joins a
//! first-come-first-served waitlist and is bumped in by scheduled
//! correction passes as capacity frees up, activation dates arrive, or
//! penalties expire. At the event's merge time the pool boundaries
//! dissolve and remaining capacity is shared.
//!
//! ## Core Guarantees
//!
//! - **Per-event serialization**: every decision for one event happens
//!   under that event's lock, acquired with a bounded wait. Contention is
//!   surfaced as a retryable error instead of an unbounded block.
//! - **Waitlist fairness**: within a correction pass an earlier-queued
//!   registration is admitted before a later one competing for the same
//!   pool, and an ineligible registration never blocks those behind it.
//! - **Decoupled payment**: charges for priced events run strictly after
//!   an admission commits and outside the event lock. A failed charge is
//!   recorded and reported but never revokes the slot.
//! - **Self-correcting counters**: cached pool counters are reconciled
//!   against the registration rows on a schedule; drift is corrected and
//!   reported, never fatal.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use eventpool::builders::EngineBuilder;
//! use eventpool::config::EngineConfig;
//! use eventpool::infra::{InMemoryEligibility, RecordingGateway};
//! use eventpool::runtime::{Scheduler, TokioSpawner};
//!
//! let config = EngineConfig::from_env()?;
//! let eligibility = InMemoryEligibility::new(config.penalty_validity());
//! let engine = std::sync::Arc::new(
//!     EngineBuilder::new()
//!         .with_config(config)
//!         .build(eligibility, RecordingGateway::new())?,
//! );
//!
//! engine.create_event(event, pools)?;
//! let outcome = engine.attempt_registration(event_id, user_id).await?;
//!
//! // Background correction and consistency loops.
//! let handle = Scheduler::start(engine, &TokioSpawner::current());
//! ```
//!
//! For complete examples, see `tests/registration_flow_test.rs`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core admission logic and per-event state.
pub mod core;
/// Configuration models for admission policy, locking, and scheduling.
pub mod config;
/// Builders to construct engines from configuration.
pub mod builders;
/// Infrastructure adapters for eligibility and payment backends.
pub mod infra;
/// Runtime adapters and the scheduled correction loops.
pub mod runtime;
/// Shared utilities.
pub mod util;
