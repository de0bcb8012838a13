//! Scheduler error types.

use std::time::Duration;
use thiserror::Error;

/// Errors returned synchronously by scheduling calls and by shutdown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Delay is too large to be represented on the wheel.
    #[error("[Scheduler] Invalid delay {delay:?}: {reason}")]
    InvalidDelay {
        /// The rejected delay.
        delay: Duration,
        /// Why it was rejected.
        reason: String,
    },

    /// Repeat interval is zero or too large.
    #[error("[Scheduler] Invalid interval {interval:?}: {reason}")]
    InvalidInterval {
        /// The rejected interval.
        interval: Duration,
        /// Why it was rejected.
        reason: String,
    },

    /// The scheduler has been shut down.
    #[error("[Scheduler] Cannot schedule after shutdown")]
    AfterShutdown,

    /// Configuration is invalid.
    #[error("[Scheduler] Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The worker thread could not be spawned.
    #[error("[Scheduler] Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    /// The worker did not hand back its registrations in time.
    #[error("[Scheduler] Shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}

impl From<sirocco_core::error::ConfigError> for SchedulerError {
    fn from(error: sirocco_core::error::ConfigError) -> Self {
        Self::InvalidConfig(error.to_string())
    }
}
