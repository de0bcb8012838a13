//! # Sirocco Telemetry
//!
//! Logging and tracing support shared by the Sirocco crates.
//!
//! This crate provides:
//! - Structured logging with JSON and pretty formats
//! - Rolling file outputs through non-blocking writers
//! - Masking of authentication tokens and other secrets
//! - Span constructors for payload handling, the scheduler worker and peer sessions

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

/// Logging configuration and initialization
pub mod logging;

/// Sensitive data masking
pub mod masking;

/// Span definitions
pub mod spans;

pub use spans::{payload_span, scheduler_span, session_span};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::logging::{LogConfig, LogFormat, LogOutput, init_logging};
    pub use crate::masking::{Sensitive, SensitiveDataMasker};
    pub use crate::spans::*;
}
