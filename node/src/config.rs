//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use liquid_governance::VotingPolicy;
use liquid_utils::LogFormat;

use crate::NodeError;

/// Configuration for a liquid-democracy voting node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between hourly backup passes.
    #[serde(default = "default_backup_interval")]
    pub backup_interval_secs: u64,

    /// Seconds between deadline sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Upper bound on any single store call, in milliseconds.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// Minimum seconds between two actions of a participant on a proposal.
    #[serde(default = "default_action_spacing")]
    pub min_action_spacing_secs: u64,

    /// Longest delegation chain a new delegation may create. Unlimited if unset.
    #[serde(default)]
    pub max_chain_length: Option<u32>,

    /// Whether to enable the admin RPC server.
    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    /// RPC port (if enabled).
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Whether to serve Prometheus metrics on the RPC server.
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub lmdb_map_size: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./liquid_data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backup_interval() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_store_timeout() -> u64 {
    5000
}

fn default_action_spacing() -> u64 {
    VotingPolicy::default().min_action_spacing_secs
}

fn default_true() -> bool {
    true
}

fn default_rpc_port() -> u16 {
    7080
}

fn default_map_size() -> usize {
    1024 * 1024 * 1024
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.sweep_interval_secs == 0 {
            return Err(NodeError::Config("sweep_interval_secs must be positive".into()));
        }
        if self.backup_interval_secs == 0 {
            return Err(NodeError::Config("backup_interval_secs must be positive".into()));
        }
        if self.store_timeout_ms == 0 {
            return Err(NodeError::Config("store_timeout_ms must be positive".into()));
        }
        if self.max_chain_length == Some(0) {
            return Err(NodeError::Config("max_chain_length must be at least 1".into()));
        }
        Ok(())
    }

    pub fn voting_policy(&self) -> VotingPolicy {
        VotingPolicy {
            min_action_spacing_secs: self.min_action_spacing_secs,
            max_chain_length: self.max_chain_length,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            backup_interval_secs: default_backup_interval(),
            sweep_interval_secs: default_sweep_interval(),
            store_timeout_ms: default_store_timeout(),
            min_action_spacing_secs: default_action_spacing(),
            max_chain_length: None,
            enable_rpc: default_true(),
            rpc_port: default_rpc_port(),
            enable_metrics: default_true(),
            lmdb_map_size: default_map_size(),
        }
    }
}
