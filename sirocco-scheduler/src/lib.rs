//! # Sirocco Scheduler
//!
//! Hashed-wheel timer scheduler driving every time-based action of the
//! Sirocco messaging substrate.
//!
//! A single background thread advances a power-of-two wheel of buckets one
//! tick at a time. Callers on any thread submit registrations through a
//! lock-free queue; the worker moves them into buckets, fires the ones that
//! are due, and re-inserts repeating ones.
//!
//! ```no_run
//! use std::time::Duration;
//! use sirocco_scheduler::HashedWheelScheduler;
//!
//! let scheduler = HashedWheelScheduler::new();
//! let handle = scheduler
//!     .schedule_once_cancelable(Duration::from_millis(50), || println!("fired"))
//!     .unwrap();
//! handle.cancel();
//! let orphans = scheduler.shutdown().unwrap();
//! assert!(orphans.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

mod bucket;
mod cancelable;
mod config;
mod error;
mod registration;
mod scheduler;

pub use cancelable::Cancelable;
pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use registration::{Registration, ScheduledAction};
pub use scheduler::{HashedWheelScheduler, SchedulerState};
