//! Builder to construct an admission engine from configuration.

use crate::config::EngineConfig;
use crate::core::{AdmissionEngine, AuditSink, EligibilitySource, EngineError, PaymentGateway};
use crate::util::clock::SharedClock;

/// Assembles an [`AdmissionEngine`] from configuration and collaborators,
/// validating the configuration before anything is built.
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Option<SharedClock>,
    audit: Option<Box<dyn AuditSink>>,
}

impl EngineBuilder {
    /// Start from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use the given clock instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build<E, G>(self, eligibility: E, payments: G) -> Result<AdmissionEngine<E, G>, EngineError>
    where
        E: EligibilitySource,
        G: PaymentGateway,
    {
        self.config
            .validate()
            .map_err(EngineError::Config)?;

        let mut engine = AdmissionEngine::new(self.config, eligibility, payments);
        if let Some(clock) = self.clock {
            engine = engine.with_clock(clock);
        }
        if let Some(audit) = self.audit {
            engine = engine.with_audit(audit);
        }
        Ok(engine)
    }
}
