//! Configuration traits for validation and environment overrides.

use crate::error::ConfigError;

/// Trait for configuration types that can check their own invariants.
///
/// ```rust
/// use sirocco_core::config::Validatable;
/// use sirocco_core::error::ConfigError;
///
/// struct QueueConfig {
///     capacity: usize,
/// }
///
/// impl Validatable for QueueConfig {
///     fn validate(&self) -> Result<(), ConfigError> {
///         if self.capacity == 0 {
///             return Err(ConfigError::invalid_value("capacity", "must be positive"));
///         }
///         Ok(())
///     }
/// }
///
/// assert!(QueueConfig { capacity: 0 }.validate().is_err());
/// ```
pub trait Validatable {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first invalid field.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Trait for configuration types whose fields can be overridden from the environment.
pub trait Configurable: Sized {
    /// Applies environment variable overrides using the given prefix
    /// (e.g. `SIROCCO` reads `SIROCCO_SERVER_ENDPOINT`).
    fn apply_env_overrides(&mut self, prefix: &str);

    /// Returns the environment variable names consulted by
    /// [`apply_env_overrides`](Configurable::apply_env_overrides).
    fn env_var_names(prefix: &str) -> Vec<String>;
}
