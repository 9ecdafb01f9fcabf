//! Configuration management for the exporter.
//!
//! Settings are layered: defaults, then an optional TOML file, then
//! command-line flags and environment variables. Later layers win.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (specified with --config)
//! 3. Command-line arguments and `CONFIG_URL` / `PORT` (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! config_url = "https://example.com/domains.json"
//! port = 9219
//! listen_address = "0.0.0.0"
//! probe_timeout_secs = 10
//! fetch_timeout_secs = 10
//! reload_interval_secs = 300
//! verify_peer = false
//! ```

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

pub use crate::error::ConfigError;

const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Partial configuration as read from one layer.
///
/// All fields are optional to support merging. Missing values are filled
/// in by defaults or reported by [`Config::validate`].
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// URL of the JSON document listing the domains to monitor
    pub config_url: Option<String>,
    /// Port serving `/metrics` and `/reload`
    pub port: Option<u16>,
    /// Address to bind
    pub listen_address: Option<String>,
    /// Connect, read and write timeout for each handshake
    pub probe_timeout_secs: Option<u64>,
    /// Timeout for fetching the domain list
    pub fetch_timeout_secs: Option<u64>,
    /// Reload the domain list in the background at this interval
    pub reload_interval_secs: Option<u64>,
    /// Validate the presented chain during the handshake
    pub verify_peer: Option<bool>,
}

/// Fully resolved configuration the exporter runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_url: Url,
    pub listen: SocketAddr,
    pub probe_timeout: Duration,
    pub fetch_timeout: Duration,
    pub reload_interval: Option<Duration>,
    pub verify_peer: bool,
}

impl Default for Config {
    /// # Default Values
    ///
    /// - `config_url`: None (must be provided)
    /// - `port`: None (must be provided)
    /// - `listen_address`: "0.0.0.0"
    /// - `probe_timeout_secs`: 10
    /// - `fetch_timeout_secs`: 10
    /// - `reload_interval_secs`: None (reload only on request)
    /// - `verify_peer`: false
    fn default() -> Self {
        Config {
            config_url: None,
            port: None,
            listen_address: Some(DEFAULT_LISTEN_ADDRESS.to_string()),
            probe_timeout_secs: Some(DEFAULT_PROBE_TIMEOUT_SECS),
            fetch_timeout_secs: Some(DEFAULT_FETCH_TIMEOUT_SECS),
            reload_interval_secs: None,
            verify_peer: Some(false),
        }
    }
}

impl Config {
    /// A layer with every field unset.
    pub fn empty() -> Self {
        Config {
            config_url: None,
            port: None,
            listen_address: None,
            probe_timeout_secs: None,
            fetch_timeout_secs: None,
            reload_interval_secs: None,
            verify_peer: None,
        }
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if `other` has a value it overrides this config's
    /// value, otherwise the current value is kept.
    pub fn merge_with(self, other: Config) -> Self {
        Config {
            config_url: other.config_url.or(self.config_url),
            port: other.port.or(self.port),
            listen_address: other.listen_address.or(self.listen_address),
            probe_timeout_secs: other.probe_timeout_secs.or(self.probe_timeout_secs),
            fetch_timeout_secs: other.fetch_timeout_secs.or(self.fetch_timeout_secs),
            reload_interval_secs: other.reload_interval_secs.or(self.reload_interval_secs),
            verify_peer: other.verify_peer.or(self.verify_peer),
        }
    }

    /// Creates a Config from command-line arguments for merging.
    ///
    /// Only provided arguments (Some values) override other layers. The
    /// `verify_peer` switch is a plain flag, so leaving it off keeps
    /// whatever the file layer says.
    pub fn from_cli_args(
        config_url: Option<String>,
        port: Option<u16>,
        listen_address: Option<String>,
        probe_timeout_secs: Option<u64>,
        fetch_timeout_secs: Option<u64>,
        reload_interval_secs: Option<u64>,
        verify_peer: bool,
    ) -> Self {
        Config {
            config_url,
            port,
            listen_address,
            probe_timeout_secs,
            fetch_timeout_secs,
            reload_interval_secs,
            verify_peer: verify_peer.then_some(true),
        }
    }

    /// Resolves the merged layers into [`Settings`].
    ///
    /// A missing or unusable `config_url` or `port` is an error; the
    /// exporter has nothing to serve without them.
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let raw_url = self
            .config_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::Validation("missing config_url (CONFIG_URL)".to_string()))?;
        let config_url = Url::parse(raw_url.trim()).map_err(|e| {
            ConfigError::Validation(format!("invalid config_url '{}': {}", raw_url, e))
        })?;
        if !matches!(config_url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "config_url must be http or https, got '{}'",
                config_url.scheme()
            )));
        }

        let port = self
            .port
            .ok_or_else(|| ConfigError::Validation("missing port (PORT)".to_string()))?;
        let address = self
            .listen_address
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string());
        let ip: IpAddr = address.parse().map_err(|_| {
            ConfigError::Validation(format!("invalid listen_address '{}'", address))
        })?;

        let probe_timeout = positive_secs(
            "probe_timeout_secs",
            self.probe_timeout_secs.unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
        )?;
        let fetch_timeout = positive_secs(
            "fetch_timeout_secs",
            self.fetch_timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        )?;
        let reload_interval = self
            .reload_interval_secs
            .map(|secs| positive_secs("reload_interval_secs", secs))
            .transpose()?;

        Ok(Settings {
            config_url,
            listen: SocketAddr::new(ip, port),
            probe_timeout,
            fetch_timeout,
            reload_interval,
            verify_peer: self.verify_peer.unwrap_or(false),
        })
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config {
            config_url: Some("https://example.com/domains.json".to_string()),
            port: Some(9219),
            listen_address: Some(DEFAULT_LISTEN_ADDRESS.to_string()),
            probe_timeout_secs: Some(DEFAULT_PROBE_TIMEOUT_SECS),
            fetch_timeout_secs: Some(DEFAULT_FETCH_TIMEOUT_SECS),
            reload_interval_secs: Some(300),
            verify_peer: Some(false),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

fn positive_secs(field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Validation(format!(
            "{} must be greater than zero",
            field
        )));
    }
    Ok(Duration::from_secs(secs))
}
