//! Configuration management for the relay.

use crate::{ConfigError, ConfigResult, Paths};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;
use url::Url;

/// Default broker service URL. Use a `pulsar+ssl://` URL to enable TLS.
pub const DEFAULT_SERVICE_URL: &str = "pulsar://localhost:6650";

/// Default fixed backoff between retry rounds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// URL schemes the broker client understands.
const SUPPORTED_SCHEMES: [&str; 2] = ["pulsar", "pulsar+ssl"];

/// Compression applied by the producer to outgoing batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    #[default]
    None,
    Lz4,
    Zlib,
}

/// How events are turned into payload bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Interpolated text line (see `codec_format`).
    #[default]
    Plain,
    /// The event's fields as a JSON document.
    Json,
}

/// Relay configuration.
///
/// Client and producer settings are forwarded to the broker connector as-is;
/// the dispatch core only reads `retries`, `retry_backoff_ms`, `message_key`,
/// `message_properties`, and the codec settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    // -- client --
    /// Broker service URL.
    pub service_url: String,
    pub allow_tls_insecure_connection: bool,
    /// Authentication method name (empty for none).
    pub auth_plugin_class_name: String,
    /// Authentication data passed to the auth method.
    pub auth_params_string: String,
    pub connections_per_broker: u32,
    pub enable_tcp_no_delay: bool,
    pub enable_tls_hostname_verification: bool,
    pub keep_alive_interval_ms: u64,
    pub num_io_threads: u32,
    pub num_listener_threads: u32,
    pub operation_timeout_secs: u64,
    pub tls_trust_certs_file_path: Option<String>,

    // -- producer --
    pub batch_max_publish_delay_ms: u64,
    pub batch_max_size: u32,
    pub block_if_queue_full: bool,
    pub compression_type: CompressionType,
    pub public_encryption_key: String,
    pub producer_properties: HashMap<String, String>,
    pub send_timeout_secs: u64,
    /// Destination topic. Required.
    pub topic_id: String,

    // -- message --
    /// Routing-key template, e.g. `%{host}`. No key is attached when unset.
    pub message_key: Option<String>,
    /// Static properties attached to every record.
    pub message_properties: HashMap<String, String>,

    // -- delivery --
    /// Extra send attempts after the first. `None` retries forever.
    pub retries: Option<i64>,
    /// Fixed pause between retry rounds.
    pub retry_backoff_ms: u64,

    // -- codec --
    pub codec: CodecKind,
    /// Format template for the plain codec.
    pub codec_format: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            allow_tls_insecure_connection: false,
            auth_plugin_class_name: String::new(),
            auth_params_string: String::new(),
            connections_per_broker: 1,
            enable_tcp_no_delay: true,
            enable_tls_hostname_verification: false,
            keep_alive_interval_ms: 30,
            num_io_threads: 1,
            num_listener_threads: 1,
            operation_timeout_secs: 30,
            tls_trust_certs_file_path: None,
            batch_max_publish_delay_ms: 10,
            batch_max_size: 16384,
            block_if_queue_full: true,
            compression_type: CompressionType::None,
            public_encryption_key: String::new(),
            producer_properties: HashMap::new(),
            send_timeout_secs: 10,
            topic_id: String::new(),
            message_key: None,
            message_properties: HashMap::new(),
            retries: None,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            codec: CodecKind::Plain,
            codec_format: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl RelayConfig {
    /// Create a config for `topic_id` with every other setting at its default.
    pub fn for_topic(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            ..Self::default()
        }
    }

    /// Load configuration from the default location, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> ConfigResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RelayConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self, paths: &Paths) -> ConfigResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from process environment variables.
    pub fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Override configuration through a variable lookup.
    ///
    /// Recognized: `PULSAR_RELAY_LOG_LEVEL`, `PULSAR_RELAY_SERVICE_URL`,
    /// `PULSAR_RELAY_TOPIC`. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).and_then(non_empty);

        if let Some(level) = get("PULSAR_RELAY_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = get("PULSAR_RELAY_SERVICE_URL") {
            self.service_url = url;
        }
        if let Some(topic) = get("PULSAR_RELAY_TOPIC") {
            self.topic_id = topic;
        }
    }

    /// Check every setting that would make startup fail.
    ///
    /// A negative retry count is rejected here, before any broker connection is
    /// attempted. A finite retry count is accepted with a data-loss warning.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(retries) = self.retries {
            if retries < 0 {
                return Err(ConfigError::Invalid(format!(
                    "A negative retry count ({}) is not valid. Must be a value >= 0",
                    retries
                )));
            }
            if retries > i64::from(u32::MAX) {
                return Err(ConfigError::Invalid(format!(
                    "retry count {} is too large (max {})",
                    retries,
                    u32::MAX
                )));
            }

            warn!(
                retries = retries,
                "Finite retry configured: events are dropped after {} failed send attempts. \
                 Remove the retry setting to keep retrying while the broker is down.",
                retries.saturating_add(1)
            );
        }

        if self.topic_id.trim().is_empty() {
            return Err(ConfigError::Invalid("topic_id is required".to_string()));
        }

        self.service_url()?;
        Ok(())
    }

    /// Get the service URL as a parsed URL, rejecting non-Pulsar schemes.
    pub fn service_url(&self) -> ConfigResult<Url> {
        let url = Url::parse(&self.service_url)?;
        if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
            return Err(ConfigError::Invalid(format!(
                "unsupported service URL scheme '{}' (expected pulsar:// or pulsar+ssl://)",
                url.scheme()
            )));
        }
        Ok(url)
    }

    /// Whether the service URL asks for a TLS connection.
    pub fn uses_tls(&self) -> bool {
        self.service_url.starts_with("pulsar+ssl://")
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
