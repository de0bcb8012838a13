//! # Sirocco Core
//!
//! Core types and collaborator interfaces for the Sirocco messaging substrate.
//!
//! This crate provides:
//! - Opaque identifiers for servers, clients, sessions and peer addresses
//! - Polymorphic message envelopes (`Request`, `Command`, `Response`)
//! - Serializer, header serializer and compressor traits with default implementations
//! - Single-consumer mailboxes used for message passing between components
//! - Error types and handling framework
//! - Configuration loading with YAML/TOML/JSON support and environment variable overrides

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]

/// Identifier wrappers
pub mod identifiers;

/// Message envelopes exchanged over the wire
pub mod messages;

/// Serialization and compression collaborators
pub mod codec;

/// Mailboxes and endpoints
pub mod mailbox;

/// Error types and handling
pub mod error;

/// Configuration management
pub mod config;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::*;
    pub use crate::identifiers::*;
    pub use crate::mailbox::*;
    pub use crate::messages::*;
}
