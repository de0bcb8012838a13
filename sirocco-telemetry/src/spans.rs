//! Span constructors used across the Sirocco crates.

use std::time::Duration;
use tracing::{Span, info_span};

/// Span covering the handling of one inbound multipart payload.
///
/// ```
/// use sirocco_telemetry::spans::payload_span;
///
/// let span = payload_span("sirocco-01", 3);
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn payload_span(server_id: &str, frames: usize) -> Span {
    info_span!(
        "payload",
        server_id = %server_id,
        frames = frames,
        message_type = tracing::field::Empty,
        sender = tracing::field::Empty,
    )
}

/// Span entered by the scheduler worker thread for its whole lifetime.
#[must_use]
pub fn scheduler_span(tick_duration: Duration, wheel_size: usize) -> Span {
    info_span!(
        "scheduler",
        tick_ms = u64::try_from(tick_duration.as_millis()).unwrap_or(u64::MAX),
        wheel_size = wheel_size,
    )
}

/// Span covering a connect or disconnect exchange with a peer.
#[must_use]
pub fn session_span(client_id: &str, operation: &str) -> Span {
    info_span!(
        "session",
        client_id = %client_id,
        operation = %operation,
        session_id = tracing::field::Empty,
    )
}
