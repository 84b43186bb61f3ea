//! Engine configuration structure.

use serde::{Deserialize, Serialize};

use crate::core::admission::AdmissionPolicy;
use crate::core::error::AppResult;

/// Engine configuration.
///
/// Every field has a default, so partial JSON documents and sparse
/// environments both work; `validate` rejects degenerate values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Penalty weight at or above which a user is waitlisted.
    pub penalty_threshold: u32,
    /// Days an issued penalty stays active.
    pub penalty_validity_days: i64,
    /// Half-width of the pre-activation bump window, in minutes.
    pub bump_window_minutes: i64,
    /// Per-attempt bound on waiting for an event lock, in milliseconds.
    pub lock_timeout_ms: u64,
    /// Lock attempts beyond the first before giving up as contended.
    pub lock_retries: u32,
    /// Seconds between scheduled waitlist bump passes.
    pub bump_interval_secs: u64,
    /// Seconds between scheduled consistency passes.
    pub consistency_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            penalty_threshold: 3,
            penalty_validity_days: 365,
            bump_window_minutes: 35,
            lock_timeout_ms: 250,
            lock_retries: 2,
            bump_interval_secs: 1800,
            consistency_interval_secs: 3600,
        }
    }
}

impl EngineConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.penalty_threshold == 0 {
            return Err("penalty_threshold must be greater than 0".into());
        }
        if self.penalty_validity_days <= 0 {
            return Err("penalty_validity_days must be greater than 0".into());
        }
        if self.bump_window_minutes < 0 {
            return Err("bump_window_minutes must not be negative".into());
        }
        if self.lock_timeout_ms == 0 {
            return Err("lock_timeout_ms must be greater than 0".into());
        }
        if self.bump_interval_secs == 0 {
            return Err("bump_interval_secs must be greater than 0".into());
        }
        if self.consistency_interval_secs == 0 {
            return Err("consistency_interval_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `EVENTPOOL_*` environment variables on top
    /// of the defaults, loading a `.env` file first when one exists.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();
        cfg.apply_env().map_err(anyhow::Error::msg)?;
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<(), String> {
        read_env("EVENTPOOL_PENALTY_THRESHOLD", &mut self.penalty_threshold)?;
        read_env(
            "EVENTPOOL_PENALTY_VALIDITY_DAYS",
            &mut self.penalty_validity_days,
        )?;
        read_env("EVENTPOOL_BUMP_WINDOW_MINUTES", &mut self.bump_window_minutes)?;
        read_env("EVENTPOOL_LOCK_TIMEOUT_MS", &mut self.lock_timeout_ms)?;
        read_env("EVENTPOOL_LOCK_RETRIES", &mut self.lock_retries)?;
        read_env("EVENTPOOL_BUMP_INTERVAL_SECS", &mut self.bump_interval_secs)?;
        read_env(
            "EVENTPOOL_CONSISTENCY_INTERVAL_SECS",
            &mut self.consistency_interval_secs,
        )
    }

    /// The pure admission policy this configuration describes.
    #[must_use]
    pub fn policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            penalty_threshold: self.penalty_threshold,
            bump_window: chrono::Duration::minutes(self.bump_window_minutes),
        }
    }

    /// How long an issued penalty stays active.
    #[must_use]
    pub fn penalty_validity(&self) -> chrono::Duration {
        chrono::Duration::days(self.penalty_validity_days)
    }

    /// Per-attempt event lock timeout.
    #[must_use]
    pub const fn lock_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lock_timeout_ms)
    }
}

fn read_env<T: std::str::FromStr>(key: &str, slot: &mut T) -> Result<(), String> {
    match std::env::var(key) {
        Ok(raw) => {
            *slot = raw
                .parse()
                .map_err(|_| format!("{key} has invalid value `{raw}`"))?;
            Ok(())
        }
        Err(std::env::VarError::NotPresent) => Ok(()),
        Err(err) => Err(format!("{key}: {err}")),
    }
}
