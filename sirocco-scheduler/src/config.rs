//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use sirocco_core::config::{Configurable, EnvOverride, Validatable, ValidationContext, Validator};
use sirocco_core::error::ConfigError;
use std::time::Duration;

/// Smallest accepted tick duration.
pub const MIN_TICK_DURATION: Duration = Duration::from_millis(10);

/// Largest accepted number of ticks per wheel.
pub const MAX_TICKS_PER_WHEEL: u32 = 1 << 30;

/// Hashed-wheel scheduler configuration.
///
/// ```
/// use sirocco_scheduler::SchedulerConfig;
/// use sirocco_core::config::{ConfigFormat, ConfigLoader, Validatable};
///
/// let config: SchedulerConfig = ConfigLoader::new()
///     .load_str("tick_duration: 20ms\nticks_per_wheel: 100\n", ConfigFormat::Yaml)
///     .unwrap();
/// assert!(config.validate().is_ok());
/// assert_eq!(config.wheel_size(), 128);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Duration of one tick.
    #[serde(with = "humantime_serde")]
    pub tick_duration: Duration,
    /// Requested wheel size, rounded up to a power of two.
    pub ticks_per_wheel: u32,
    /// How long `shutdown` waits for the worker to hand back registrations.
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(10),
            ticks_per_wheel: 512,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl SchedulerConfig {
    /// Number of buckets: the next power of two at or above `ticks_per_wheel`.
    #[must_use]
    pub fn wheel_size(&self) -> usize {
        (self.ticks_per_wheel.max(1) as usize).next_power_of_two()
    }

    /// Tick duration in nanoseconds, saturating at `u64::MAX`.
    #[must_use]
    pub fn tick_nanos(&self) -> u64 {
        u64::try_from(self.tick_duration.as_nanos()).unwrap_or(u64::MAX)
    }
}

impl Validatable for SchedulerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut ctx = ValidationContext::new();
        ctx.enter("scheduler");
        let max_tick = u64::MAX / self.wheel_size() as u64 - 1;
        Validator::new(&mut ctx)
            .in_range("ticks_per_wheel", &self.ticks_per_wheel, &1, &MAX_TICKS_PER_WHEEL)
            .min_duration("tick_duration", self.tick_duration, MIN_TICK_DURATION)
            .custom(
                "tick_duration",
                || self.tick_nanos() <= max_tick,
                "tick duration multiplied by wheel size overflows",
            )
            .positive("shutdown_timeout_ms", &self.shutdown_timeout.as_millis());
        ctx.into_result()
    }
}

impl Configurable for SchedulerConfig {
    fn apply_env_overrides(&mut self, prefix: &str) {
        EnvOverride::apply_duration_ms(
            &format!("{prefix}_SCHEDULER_TICK_MS"),
            &mut self.tick_duration,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_SCHEDULER_TICKS_PER_WHEEL"),
            &mut self.ticks_per_wheel,
        );
        EnvOverride::apply_duration_ms(
            &format!("{prefix}_SCHEDULER_SHUTDOWN_TIMEOUT_MS"),
            &mut self.shutdown_timeout,
        );
    }

    fn env_var_names(prefix: &str) -> Vec<String> {
        vec![
            format!("{prefix}_SCHEDULER_TICK_MS"),
            format!("{prefix}_SCHEDULER_TICKS_PER_WHEEL"),
            format!("{prefix}_SCHEDULER_SHUTDOWN_TIMEOUT_MS"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.tick_duration, Duration::from_millis(10));
        assert_eq!(config.wheel_size(), 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wheel_size_rounds_up() {
        let config = SchedulerConfig {
            ticks_per_wheel: 513,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.wheel_size(), 1024);
    }

    #[test]
    fn test_rejects_short_tick() {
        let config = SchedulerConfig {
            tick_duration: Duration::from_millis(1),
            ..SchedulerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scheduler.tick_duration"));
    }

    #[test]
    fn test_rejects_overflowing_tick() {
        let config = SchedulerConfig {
            tick_duration: Duration::from_secs(u64::MAX / 1_000_000_000),
            ticks_per_wheel: 1 << 20,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_humantime_yaml() {
        let config: SchedulerConfig =
            serde_yaml::from_str("tick_duration: 25ms\nshutdown_timeout: 2s\n").unwrap();
        assert_eq!(config.tick_duration, Duration::from_millis(25));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
        assert_eq!(config.ticks_per_wheel, 512);
    }
}
