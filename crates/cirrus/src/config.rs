//! Node configuration.
//!
//! All settings live in a single `cirrus.toml` file. Every section is
//! validated on load; a node never starts on a configuration it cannot run.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use cirrus_consensus::RaftTiming;
use cirrus_interconnect::{DimensionConfig, RoutingMode, Topology, TopologyError};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file at {path}: {source}")]
    FileRead {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the TOML document.
    #[error("failed to parse config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A required field is empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The listen address does not parse as a socket address.
    #[error("invalid listen address: {0}")]
    InvalidListenAddr(String),

    /// A peer address is empty or malformed.
    #[error("invalid peer address: {0}")]
    InvalidPeerAddress(String),

    /// A timing field must be positive.
    #[error("invalid timeout: {name} must be positive")]
    InvalidTimeout {
        /// Name of the offending field.
        name: &'static str,
    },

    /// The election timeout range is inverted.
    #[error("election timeout range inverted: min {min}ms >= max {max}ms")]
    InvertedElectionRange {
        /// Configured floor in milliseconds.
        min: u64,
        /// Configured ceiling in milliseconds.
        max: u64,
    },

    /// The interconnect layout is invalid.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// The local coordinate does not fit the configured dimensions.
    #[error("local coordinate {coord:?} does not fit the configured dimensions")]
    CoordinateOutOfRange {
        /// The offending coordinate.
        coord: Vec<u64>,
    },

    /// The log level is not one of trace, debug, info, warn, error.
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Full node configuration, loaded from one `cirrus.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Node identity and peer list.
    pub node: NodeConfig,

    /// Consensus timing.
    #[serde(default)]
    pub consensus: ConsensusConfig,

    /// Persistent store location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Interconnect layout for job placement.
    #[serde(default)]
    pub interconnect: InterconnectConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        info!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        debug!(node_id = %config.node.node_id, "configuration validated");
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.node.validate()?;
        self.consensus.validate()?;
        self.storage.validate()?;
        self.interconnect.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Node identity and peer list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// Unique label used in vote and leader fields.
    pub node_id: String,

    /// Address the RPC listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Contactable peer addresses (e.g. `http://10.0.0.2:3001`).
    #[serde(default)]
    pub peers: Vec<String>,

    /// Root directory for the service-identity computation.
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_base_dir() -> String {
    ".".to_string()
}

impl NodeConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.node_id.is_empty() {
            return Err(ConfigError::MissingField("node.node_id"));
        }
        if self.base_dir.is_empty() {
            return Err(ConfigError::MissingField("node.base_dir"));
        }
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidListenAddr(self.listen_addr.clone()))?;
        for peer in &self.peers {
            if peer.is_empty() || !(peer.starts_with("http://") || peer.starts_with("https://")) {
                return Err(ConfigError::InvalidPeerAddress(peer.clone()));
            }
        }
        Ok(())
    }

    /// The parsed listen address.
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr.parse().expect("validated at load")
    }
}

/// Consensus timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Election timeout floor in milliseconds.
    pub election_timeout_min_ms: u64,
    /// Election timeout ceiling in milliseconds.
    pub election_timeout_max_ms: u64,
    /// Leader heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Per-attempt RPC timeout in milliseconds.
    pub rpc_timeout_ms: u64,
    /// RPC attempts per peer per round.
    pub rpc_attempts: u32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            election_timeout_min_ms: 150,
            election_timeout_max_ms: 300,
            heartbeat_interval_ms: 50,
            rpc_timeout_ms: 100,
            rpc_attempts: 3,
        }
    }
}

impl ConsensusConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.election_timeout_min_ms == 0 {
            return Err(ConfigError::InvalidTimeout {
                name: "consensus.election_timeout_min_ms",
            });
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidTimeout {
                name: "consensus.heartbeat_interval_ms",
            });
        }
        if self.rpc_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout {
                name: "consensus.rpc_timeout_ms",
            });
        }
        if self.rpc_attempts == 0 {
            return Err(ConfigError::InvalidTimeout {
                name: "consensus.rpc_attempts",
            });
        }
        if self.election_timeout_min_ms >= self.election_timeout_max_ms {
            return Err(ConfigError::InvertedElectionRange {
                min: self.election_timeout_min_ms,
                max: self.election_timeout_max_ms,
            });
        }
        Ok(())
    }

    /// Convert to the engine's timing struct.
    pub fn timing(&self) -> RaftTiming {
        RaftTiming {
            election_timeout_min: Duration::from_millis(self.election_timeout_min_ms),
            election_timeout_max: Duration::from_millis(self.election_timeout_max_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            rpc_timeout: Duration::from_millis(self.rpc_timeout_ms),
            rpc_attempts: self.rpc_attempts,
        }
    }
}

/// Persistent store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Durable store location.
    pub path: String,
    /// Whether writes sync before a commit is reported.
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
}

fn default_sync_writes() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./data/cirrus".to_string(),
            sync_writes: true,
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.path.is_empty() {
            return Err(ConfigError::MissingField("storage.path"));
        }
        Ok(())
    }
}

/// Interconnect layout for the job scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InterconnectConfig {
    /// Dimension sizes and bypass arc sets.
    #[serde(default)]
    pub dimensions: Vec<DimensionConfig>,

    /// Use max-of-dims (all-port) instead of sum-of-dims (one-port).
    #[serde(default)]
    pub all_port: bool,

    /// This node's coordinate, registered at startup when present.
    #[serde(default)]
    pub coordinate: Option<Vec<u64>>,
}

impl InterconnectConfig {
    fn validate(&self) -> ConfigResult<()> {
        let topology = self.topology()?;
        if let Some(coord) = &self.coordinate {
            if !topology.contains(coord) {
                return Err(ConfigError::CoordinateOutOfRange {
                    coord: coord.clone(),
                });
            }
        }
        Ok(())
    }

    /// Build the validated topology.
    pub fn topology(&self) -> ConfigResult<Topology> {
        let mode = if self.all_port {
            RoutingMode::AllPort
        } else {
            RoutingMode::OnePort
        };
        Ok(Topology::new(self.dimensions.clone(), mode)?)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn or error.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.level.clone()));
        }
        Ok(())
    }
}
