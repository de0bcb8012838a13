//! Configuration loading and validation shared by the scheduler and server crates.
//!
//! Supports YAML, TOML and JSON files, environment variable overrides
//! and fluent validation with dotted field paths.
//!
//! ```rust,ignore
//! use sirocco_core::config::{ConfigLoader, Configurable, Validatable};
//!
//! let mut config: ServerConfig = ConfigLoader::new().load_file("server.yaml")?;
//! config.apply_env_overrides("SIROCCO");
//! config.validate()?;
//! ```

mod loader;
mod traits;
pub mod validation;

pub use loader::{ConfigFormat, ConfigLoader};
pub use traits::{Configurable, Validatable};
pub use validation::{EnvOverride, ValidationContext, ValidationResult, Validator};
