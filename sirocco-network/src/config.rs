//! Message server configuration.

use serde::{Deserialize, Serialize};
use sirocco_core::codec::CompressionCodec;
use sirocco_core::config::{Configurable, EnvOverride, Validatable, ValidationContext, Validator};
use sirocco_core::error::ConfigError;
use std::time::Duration;

use crate::transport::frame::DEFAULT_MAX_FRAME_BYTES;
use crate::transport::{MEMORY_SCHEME, TCP_SCHEME};

/// Message server configuration.
///
/// ```
/// use sirocco_core::config::{ConfigFormat, ConfigLoader, Validatable};
/// use sirocco_network::ServerConfig;
///
/// let config: ServerConfig = ConfigLoader::new()
///     .load_str(
///         r#"
/// server_id = "sirocco-01"
/// recv_endpoint = "tcp://127.0.0.1:5555"
/// send_endpoint = "tcp://127.0.0.1:5556"
/// correlation_ttl = "5m"
/// "#,
///         ConfigFormat::Toml,
///     )
///     .unwrap();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Identity reported in `Connected`/`Disconnected` responses.
    pub server_id: String,
    /// Endpoint of the inbound request socket (`tcp://host:port` or `mem://name`).
    pub recv_endpoint: String,
    /// Endpoint of the outbound response socket.
    pub send_endpoint: String,
    /// Compression applied to header and body frames.
    pub compression: CompressionCodec,
    /// Bounded wait for the in-flight payload when stopping.
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,
    /// Largest frame accepted or sent by TCP sockets, and largest header or
    /// body after decompression.
    pub max_frame_bytes: usize,
    /// Age after which unanswered correlation entries may be purged.
    /// `None` keeps them until answered.
    #[serde(with = "humantime_serde")]
    pub correlation_ttl: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_id: "sirocco-server".to_string(),
            recv_endpoint: "tcp://127.0.0.1:5555".to_string(),
            send_endpoint: "tcp://127.0.0.1:5556".to_string(),
            compression: CompressionCodec::default(),
            drain_timeout: Duration::from_secs(2),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            correlation_ttl: None,
        }
    }
}

fn has_known_scheme(endpoint: &str) -> bool {
    endpoint.starts_with(TCP_SCHEME) || endpoint.starts_with(MEMORY_SCHEME)
}

impl Validatable for ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut ctx = ValidationContext::new();
        ctx.enter("server");
        let scheme_msg = format!("must start with {TCP_SCHEME} or {MEMORY_SCHEME}");
        Validator::new(&mut ctx)
            .require_non_empty("server_id", &self.server_id)
            .require_non_empty("recv_endpoint", &self.recv_endpoint)
            .require_non_empty("send_endpoint", &self.send_endpoint)
            .custom("recv_endpoint", || has_known_scheme(&self.recv_endpoint), &scheme_msg)
            .custom("send_endpoint", || has_known_scheme(&self.send_endpoint), &scheme_msg)
            .custom(
                "send_endpoint",
                || self.recv_endpoint != self.send_endpoint || self.send_endpoint.ends_with(":0"),
                "must differ from recv_endpoint",
            )
            .positive("max_frame_bytes", &self.max_frame_bytes)
            .min_duration("drain_timeout", self.drain_timeout, Duration::from_millis(1))
            .custom(
                "correlation_ttl",
                || self.correlation_ttl.is_none_or(|ttl| !ttl.is_zero()),
                "must be positive when set",
            );
        ctx.into_result()
    }
}

impl Configurable for ServerConfig {
    fn apply_env_overrides(&mut self, prefix: &str) {
        EnvOverride::apply_string(&format!("{prefix}_SERVER_ID"), &mut self.server_id);
        EnvOverride::apply_string(&format!("{prefix}_RECV_ENDPOINT"), &mut self.recv_endpoint);
        EnvOverride::apply_string(&format!("{prefix}_SEND_ENDPOINT"), &mut self.send_endpoint);
        EnvOverride::apply_duration_ms(
            &format!("{prefix}_SERVER_DRAIN_TIMEOUT_MS"),
            &mut self.drain_timeout,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_SERVER_MAX_FRAME_BYTES"),
            &mut self.max_frame_bytes,
        );
    }

    fn env_var_names(prefix: &str) -> Vec<String> {
        vec![
            format!("{prefix}_SERVER_ID"),
            format!("{prefix}_RECV_ENDPOINT"),
            format!("{prefix}_SEND_ENDPOINT"),
            format!("{prefix}_SERVER_DRAIN_TIMEOUT_MS"),
            format!("{prefix}_SERVER_MAX_FRAME_BYTES"),
        ]
    }
}
