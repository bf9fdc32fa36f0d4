//! Collector configuration
//!
//! Every field has a default; a config file only needs to name what it
//! overrides. Loading always ends in `validate()`, so an invalid config never
//! reaches the collector.
//!
//! ```toml
//! period = 10          # seconds
//! host = "localhost"
//! port = 6379
//! network = "tcp"      # tcp | tcp4 | tcp6 | unix
//! maxconn = 10
//! keys = ["user:*"]
//!
//! [auth]
//! required = true
//! requiredpass = "secret"
//!
//! [stats]
//! commandstats = false
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collector::StatCategory;
use crate::error::ConfigError;

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(10);
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_NETWORK: &str = "tcp";
pub const DEFAULT_MAX_CONN: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Network kinds the collector can dial
pub const SUPPORTED_NETWORKS: [&str; 4] = ["tcp", "tcp4", "tcp6", "unix"];

/// Resolved collector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorConfig {
    /// Polling period (default: 10s)
    #[serde(with = "duration_secs")]
    pub period: Duration,
    /// Target host, or socket path when `network = "unix"` (default: localhost)
    pub host: String,
    /// Target port (default: 6379)
    pub port: u16,
    /// Transport kind (default: tcp)
    pub network: String,
    /// Maximum concurrent pooled connections (default: 10)
    #[serde(rename = "maxconn", alias = "max_conn")]
    pub max_conn: usize,
    /// Dial and round-trip timeout (default: 5s)
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// What a failing category does to the rest of its cycle
    pub failure_policy: FailurePolicy,
    pub auth: AuthConfig,
    pub stats: StatsConfig,
    /// Key-match patterns for the key export, in order (default: none)
    pub keys: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            period: DEFAULT_PERIOD,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            network: DEFAULT_NETWORK.to_string(),
            max_conn: DEFAULT_MAX_CONN,
            timeout: DEFAULT_TIMEOUT,
            failure_policy: FailurePolicy::default(),
            auth: AuthConfig::default(),
            stats: StatsConfig::default(),
            keys: Vec::new(),
        }
    }
}

/// Authentication settings
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Send AUTH on every new connection (default: false)
    pub required: bool,
    /// The AUTH secret (default: empty)
    pub requiredpass: String,
}

impl AuthConfig {
    /// Secret to authenticate with, if authentication is enabled
    pub fn secret(&self) -> Option<&str> {
        self.required.then_some(self.requiredpass.as_str())
    }
}

// Keeps the secret out of debug logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("required", &self.required)
            .field("requiredpass", &"<redacted>")
            .finish()
    }
}

/// One switch per INFO category, all enabled by default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatsConfig {
    pub server: bool,
    pub clients: bool,
    pub memory: bool,
    pub persistence: bool,
    pub stats: bool,
    pub replication: bool,
    pub cpu: bool,
    pub commandstats: bool,
    pub cluster: bool,
    pub keyspace: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            server: true,
            clients: true,
            memory: true,
            persistence: true,
            stats: true,
            replication: true,
            cpu: true,
            commandstats: true,
            cluster: true,
            keyspace: true,
        }
    }
}

impl StatsConfig {
    pub fn is_enabled(&self, category: StatCategory) -> bool {
        match category {
            StatCategory::Server => self.server,
            StatCategory::Clients => self.clients,
            StatCategory::Memory => self.memory,
            StatCategory::Persistence => self.persistence,
            StatCategory::Stats => self.stats,
            StatCategory::Replication => self.replication,
            StatCategory::Cpu => self.cpu,
            StatCategory::Commandstats => self.commandstats,
            StatCategory::Cluster => self.cluster,
            StatCategory::Keyspace => self.keyspace,
        }
    }
}

/// Behavior of a collection cycle after a category fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and collect the remaining categories
    #[default]
    Continue,
    /// Log the failure and skip the remaining categories until the next tick
    AbortCycle,
}

impl CollectorConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: CollectorConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&data)
    }

    /// Reject settings the collector cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period.is_zero() {
            return Err(ConfigError::Invalid("period must be greater than zero".into()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be greater than zero".into()));
        }
        if self.max_conn == 0 {
            return Err(ConfigError::Invalid("maxconn must be at least 1".into()));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if !SUPPORTED_NETWORKS.contains(&self.network.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "network {:?} is not one of {:?}",
                self.network, SUPPORTED_NETWORKS
            )));
        }
        if self.network != "unix" && self.port == 0 {
            return Err(ConfigError::Invalid("port must not be 0".into()));
        }
        if self.auth.required && self.auth.requiredpass.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.required is set but auth.requiredpass is empty".into(),
            ));
        }
        if let Some(pos) = self.keys.iter().position(|p| p.is_empty()) {
            return Err(ConfigError::Invalid(format!("keys[{}] is an empty pattern", pos)));
        }
        Ok(())
    }

    /// Enabled categories, in collection order
    pub fn enabled_categories(&self) -> Vec<StatCategory> {
        StatCategory::ALL
            .into_iter()
            .filter(|c| self.stats.is_enabled(*c))
            .collect()
    }

    /// Dial address: `host:port`, or the socket path for unix sockets
    pub fn address(&self) -> String {
        if self.network == "unix" {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Log the resolved settings, one field per line
    pub fn log_summary(&self) {
        debug!("Collector configuration:");
        debug!("Period {:?}", self.period);
        debug!("Host {}", self.host);
        debug!("Port {}", self.port);
        debug!("Network {}", self.network);
        debug!("Max connections {}", self.max_conn);
        debug!("Timeout {:?}", self.timeout);
        debug!("Failure policy {:?}", self.failure_policy);
        debug!("Auth {}", self.auth.required);
        for category in StatCategory::ALL {
            debug!("{} statistics {}", category, self.stats.is_enabled(category));
        }
        debug!("Key patterns {:?}", self.keys);
    }
}

/// Serde helper for Duration as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
