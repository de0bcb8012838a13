//! Fluent validation helpers and environment overrides.

use crate::error::ConfigError;
use std::time::Duration;

/// Result type for validation operations.
pub type ValidationResult = Result<(), ConfigError>;

/// Tracks the current section path and collects validation errors.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    path: Vec<String>,
    errors: Vec<ConfigError>,
}

impl ValidationContext {
    /// Creates a new validation context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a configuration section.
    pub fn enter(&mut self, section: impl Into<String>) {
        self.path.push(section.into());
    }

    /// Exits the current section.
    pub fn exit(&mut self) {
        self.path.pop();
    }

    /// Returns the current path as a dot-separated string.
    #[must_use]
    pub fn current_path(&self) -> String {
        self.path.join(".")
    }

    /// Adds a validation error.
    pub fn add_error(&mut self, error: ConfigError) {
        self.errors.push(error);
    }

    /// Returns true if there are no validation errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the collected validation errors.
    #[must_use]
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    /// Consumes the context and returns the first error, if any.
    ///
    /// # Errors
    ///
    /// Returns the first recorded error.
    pub fn into_result(self) -> ValidationResult {
        self.errors.into_iter().next().map_or(Ok(()), Err)
    }

    fn qualify(&self, field: &str) -> String {
        if self.path.is_empty() {
            field.to_string()
        } else {
            format!("{}.{field}", self.current_path())
        }
    }

    fn missing_field(&self, field: &str) -> ConfigError {
        let section = (!self.path.is_empty()).then(|| self.current_path());
        ConfigError::MissingField {
            field: field.to_string(),
            section,
        }
    }

    fn invalid_value(&self, field: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            field: self.qualify(field),
            reason: reason.into(),
        }
    }
}

/// Fluent validator over a [`ValidationContext`].
///
/// ```rust
/// use sirocco_core::config::{ValidationContext, Validator};
///
/// let mut ctx = ValidationContext::new();
/// ctx.enter("scheduler");
/// Validator::new(&mut ctx)
///     .positive("ticks_per_wheel", &0_u32)
///     .require_non_empty("name", "wheel");
/// let err = ctx.into_result().unwrap_err();
/// assert!(err.to_string().contains("scheduler.ticks_per_wheel"));
/// ```
#[derive(Debug)]
pub struct Validator<'a> {
    ctx: &'a mut ValidationContext,
}

impl<'a> Validator<'a> {
    /// Creates a new validator with the given context.
    pub fn new(ctx: &'a mut ValidationContext) -> Self {
        Self { ctx }
    }

    /// Validates that a string field is not empty.
    pub fn require_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            let error = self.ctx.missing_field(field);
            self.ctx.add_error(error);
        }
        self
    }

    /// Validates that a value is within an inclusive range.
    pub fn in_range<T: PartialOrd + std::fmt::Display>(
        &mut self,
        field: &str,
        value: &T,
        min: &T,
        max: &T,
    ) -> &mut Self {
        if value < min || value > max {
            let error = self
                .ctx
                .invalid_value(field, format!("Value {value} must be between {min} and {max}"));
            self.ctx.add_error(error);
        }
        self
    }

    /// Validates that a numeric value is positive.
    pub fn positive<T: PartialOrd + Default + std::fmt::Display>(
        &mut self,
        field: &str,
        value: &T,
    ) -> &mut Self {
        if *value <= T::default() {
            let error = self
                .ctx
                .invalid_value(field, format!("Value {value} must be positive"));
            self.ctx.add_error(error);
        }
        self
    }

    /// Validates that a duration is at least `min`.
    pub fn min_duration(&mut self, field: &str, value: Duration, min: Duration) -> &mut Self {
        if value < min {
            let error = self.ctx.invalid_value(
                field,
                format!("Duration {value:?} must be at least {min:?}"),
            );
            self.ctx.add_error(error);
        }
        self
    }

    /// Validates using a custom predicate.
    pub fn custom<F>(&mut self, field: &str, predicate: F, error_msg: &str) -> &mut Self
    where
        F: FnOnce() -> bool,
    {
        if !predicate() {
            let error = self.ctx.invalid_value(field, error_msg);
            self.ctx.add_error(error);
        }
        self
    }
}

/// Environment variable helpers for applying overrides.
pub struct EnvOverride;

impl EnvOverride {
    /// Overrides a string value.
    pub fn apply_string(var_name: &str, target: &mut String) {
        if let Ok(value) = std::env::var(var_name) {
            *target = value;
        }
    }

    /// Overrides a numeric value; unparsable values are ignored.
    pub fn apply_number<T: std::str::FromStr>(var_name: &str, target: &mut T) {
        if let Ok(value) = std::env::var(var_name)
            && let Ok(parsed) = value.parse()
        {
            *target = parsed;
        }
    }

    /// Overrides a duration given in milliseconds.
    pub fn apply_duration_ms(var_name: &str, target: &mut Duration) {
        if let Ok(value) = std::env::var(var_name)
            && let Ok(ms) = value.parse::<u64>()
        {
            *target = Duration::from_millis(ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_paths() {
        let mut ctx = ValidationContext::new();
        ctx.enter("server");
        ctx.enter("queue");
        assert_eq!(ctx.current_path(), "server.queue");
        ctx.exit();
        assert_eq!(ctx.current_path(), "server");
    }

    #[test]
    fn test_validator_collects_errors() {
        let mut ctx = ValidationContext::new();
        Validator::new(&mut ctx)
            .require_non_empty("endpoint", "")
            .in_range("ticks_per_wheel", &0_u32, &1, &(1 << 30))
            .min_duration(
                "tick_duration",
                Duration::from_millis(1),
                Duration::from_millis(10),
            );
        assert_eq!(ctx.errors().len(), 3);
        assert!(matches!(
            ctx.into_result(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_validator_passes() {
        let mut ctx = ValidationContext::new();
        Validator::new(&mut ctx)
            .positive("capacity", &16_usize)
            .custom("endpoint", || true, "unreachable");
        assert!(ctx.is_valid());
    }

    #[test]
    fn test_env_override_missing_var_keeps_value() {
        let mut value = 7_u32;
        EnvOverride::apply_number("SIROCCO_TEST_DEFINITELY_UNSET_VAR", &mut value);
        assert_eq!(value, 7);
    }
}
