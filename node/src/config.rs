//! Node configuration with TOML file support, and the genesis document.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use tessera_consensus::RulesKind;
use tessera_crypto::blake2b_256;
use tessera_transactions::canonical_bytes;
use tessera_types::{BlockHash, PublicKey, Timestamp};

use crate::NodeError;

/// Configuration for a tessera node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for ledger storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in megabytes.
    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,

    /// Which consensus rules validate transactions and blocks.
    #[serde(default)]
    pub rules: RulesKind,

    /// Registered voters (hex public keys), used by the voting rules.
    #[serde(default)]
    pub voters: Vec<PublicKey>,

    /// JSON-RPC endpoint of the consensus engine.
    #[serde(default = "default_engine_rpc_url")]
    pub engine_rpc_url: String,

    /// Request timeout for broadcast calls, in seconds.
    #[serde(default = "default_broadcast_timeout_secs")]
    pub broadcast_timeout_secs: u64,

    /// Upper bound on one commit's storage write, in milliseconds.
    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,

    /// Change logs of legacy replication peers.
    #[serde(default)]
    pub peers: Vec<String>,

    /// Initial back-off after a peer feed fails, in seconds.
    #[serde(default = "default_peer_retry_secs")]
    pub peer_retry_secs: u64,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to collect Prometheus metrics.
    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./tessera_data")
}

fn default_map_size_mb() -> usize {
    1024
}

fn default_engine_rpc_url() -> String {
    "http://127.0.0.1:26657".to_string()
}

fn default_broadcast_timeout_secs() -> u64 {
    30
}

fn default_commit_timeout_ms() -> u64 {
    5_000
}

fn default_peer_retry_secs() -> u64 {
    1
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
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

    /// Reject settings no node can run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.map_size_mb == 0 {
            return Err(NodeError::Config("map_size_mb must be positive".into()));
        }
        if self.commit_timeout_ms == 0 {
            return Err(NodeError::Config("commit_timeout_ms must be positive".into()));
        }
        if self.rules == RulesKind::Voting && self.voters.is_empty() {
            return Err(NodeError::Config(
                "voting rules need at least one registered voter".into(),
            ));
        }
        Ok(())
    }

    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_secs(self.broadcast_timeout_secs)
    }

    pub fn peer_retry(&self) -> Duration {
        Duration::from_secs(self.peer_retry_secs.max(1))
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size_mb: default_map_size_mb(),
            rules: RulesKind::default(),
            voters: Vec::new(),
            engine_rpc_url: default_engine_rpc_url(),
            broadcast_timeout_secs: default_broadcast_timeout_secs(),
            commit_timeout_ms: default_commit_timeout_ms(),
            peers: Vec::new(),
            peer_retry_secs: default_peer_retry_secs(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}

/// The genesis document the consensus engine hands to `init_chain`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genesis {
    pub chain_id: String,
    #[serde(default)]
    pub genesis_time: Timestamp,
    /// Engine-specific application state, opaque to the node.
    #[serde(default)]
    pub app_state: serde_json::Value,
}

impl Genesis {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            genesis_time: Timestamp::EPOCH,
            app_state: serde_json::Value::Null,
        }
    }

    pub fn from_json_file(path: &str) -> Result<Self, NodeError> {
        let content = std::fs::read(path).map_err(|e| NodeError::Config(e.to_string()))?;
        serde_json::from_slice(&content).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Blake2b-256 of the canonical JSON encoding.
    pub fn digest(&self) -> Result<BlockHash, NodeError> {
        let value = serde_json::to_value(self).map_err(|e| NodeError::Config(e.to_string()))?;
        Ok(BlockHash::new(blake2b_256(&canonical_bytes(&value))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().expect("serializable");
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.engine_rpc_url, config.engine_rpc_url);
        assert_eq!(parsed.rules, RulesKind::Engine);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.map_size_mb, 1024);
        assert_eq!(config.commit_timeout_ms, 5_000);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            rules = "voting"
            voters = ["0101010101010101010101010101010101010101010101010101010101010101"]
            peers = ["/var/lib/peer-a.ndjson"]
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.rules, RulesKind::Voting);
        assert_eq!(config.voters, vec![PublicKey([1u8; 32])]);
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.log_level, "info"); // default
    }

    #[test]
    fn voting_without_voters_is_rejected() {
        assert!(matches!(
            NodeConfig::from_toml_str(r#"rules = "voting""#),
            Err(NodeError::Config(_))
        ));
    }

    #[test]
    fn unknown_rules_name_is_a_config_error() {
        assert!(matches!(
            NodeConfig::from_toml_str(r#"rules = "pow""#),
            Err(NodeError::Config(_))
        ));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn genesis_digest_tracks_content() {
        let a = Genesis::new("tessera-test");
        let mut b = a.clone();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        b.chain_id = "tessera-other".into();
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }
}
