//! # Node Configuration
//!
//! The populated configuration object handed to the node process at startup.
//!
//! The [`Node`](crate::lifecycle::Node) reads none of these fields. They are passed to
//! whichever services need them when those services are constructed, before registration.
//! Only [`LogConfig`] is consumed directly, by
//! [`setup_tracing`](crate::lifecycle::setup_tracing).
//!
//! Every struct is `serde`-enabled with `#[serde(default)]`, so a loader only has to supply
//! the fields it wants to override. The document layout is the node's established
//! `config.json` shape:
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/beamlight",
//!   "chain": "testnet",
//!   "network": { "listen_address": "0.0.0.0:30303", "max_peers": 50 },
//!   "database": { "engine": "leveldb", "cache_size": 256 },
//!   "log": { "level": "info", "file": "", "format": "text" },
//!   "enable_metrics": true,
//!   "metrics_address": "127.0.0.1:8080"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Top-level node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory for the database and keystore.
    pub data_dir: PathBuf,
    /// Which chain to join.
    pub chain: Network,
    /// Peer-to-peer settings, stored under the `network` key.
    #[serde(rename = "network")]
    pub p2p: P2pConfig,
    pub database: DatabaseConfig,
    pub log: LogConfig,
    /// Stored as the top-level `enable_metrics` and `metrics_address` keys.
    #[serde(flatten)]
    pub metrics: MetricsConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: home_dir().join(".beamlight"),
            chain: Network::default(),
            p2p: P2pConfig::default(),
            database: DatabaseConfig::default(),
            log: LogConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// The chain the node joins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Devnet,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Mainnet, Network::Testnet, Network::Devnet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a network name is not one of [`Network::ALL`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid network: {0} (valid networks: mainnet, testnet, devnet)")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownNetwork(s.to_string()))
    }
}

/// Peer-to-peer settings, consumed by the networking service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pConfig {
    pub listen_address: SocketAddr,
    pub bootstrap_nodes: Vec<String>,
    pub max_peers: usize,
    pub enable_discovery: bool,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 30303)),
            bootstrap_nodes: Vec::new(),
            max_peers: 50,
            enable_discovery: true,
        }
    }
}

/// Storage settings, consumed by the database service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Storage engine, e.g. `leveldb` or `badger`.
    pub engine: String,
    /// Cache size in megabytes.
    pub cache_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: "leveldb".to_string(),
            cache_size: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings. `RUST_LOG`, when set, takes precedence over `level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// A level (`info`) or any `EnvFilter` directive (`beamlight=debug,warn`).
    pub level: String,
    pub format: LogFormat,
    /// Log file. `None` or an empty path writes to stderr.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// The log file to append to, if any.
    pub fn file(&self) -> Option<&Path> {
        self.file
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    #[serde(rename = "enable_metrics")]
    pub enabled: bool,
    #[serde(rename = "metrics_address")]
    pub address: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

fn home_dir() -> PathBuf {
    ["HOME", "USERPROFILE"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .find(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}
