//! The application state a node builds once at start-up and threads through
//! every component: configuration, store, rules and metrics.

use std::sync::Arc;

use tessera_broadcast::{BroadcastClient, HttpTransport};
use tessera_consensus::ConsensusRules;
use tessera_store::LedgerStore;
use tessera_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment};

use crate::{ConsensusBridge, NodeConfig, NodeError, NodeMetrics, Replicator};

pub struct AppState<S> {
    pub config: NodeConfig,
    pub store: Arc<S>,
    pub rules: Arc<dyn ConsensusRules>,
    pub metrics: Arc<NodeMetrics>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            rules: Arc::clone(&self.rules),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl AppState<LmdbEnvironment> {
    /// Open the LMDB store under `config.data_dir`.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        check_data_dir(&config.data_dir).map_err(NodeError::Config)?;
        let store = LmdbEnvironment::open(&config.data_dir, config.map_size_bytes())?;
        let report = check_integrity(&store)?;
        if !report.is_healthy() {
            for error in &report.errors {
                tracing::error!(%error, "ledger store integrity check failed");
            }
            return Err(NodeError::Config(format!(
                "ledger store at {} failed its integrity check",
                config.data_dir.display()
            )));
        }
        tracing::info!(
            data_dir = %config.data_dir.display(),
            entries = report.total_entries,
            "ledger store opened"
        );
        Self::new(config, Arc::new(store))
    }
}

impl<S: LedgerStore> AppState<S> {
    /// Build the state over an already opened store. The rule set named by
    /// the configuration is instantiated here and nowhere else.
    pub fn new(config: NodeConfig, store: Arc<S>) -> Result<Self, NodeError> {
        let rules: Arc<dyn ConsensusRules> = Arc::from(config.rules.build(config.voters.clone()));
        let metrics = Arc::new(NodeMetrics::new()?);
        Ok(Self {
            config,
            store,
            rules,
            metrics,
        })
    }

    pub fn bridge(&self) -> Result<ConsensusBridge<S>, NodeError> {
        ConsensusBridge::open(self)
    }

    pub fn replicator(&self) -> Replicator<S> {
        Replicator::new(self)
    }

    pub fn broadcast_client(&self) -> BroadcastClient<HttpTransport> {
        broadcast_client(&self.config)
    }
}

/// Client for the consensus engine's RPC endpoint named in `config`.
pub fn broadcast_client(config: &NodeConfig) -> BroadcastClient<HttpTransport> {
    BroadcastClient::new(HttpTransport::with_timeout(
        config.engine_rpc_url.clone(),
        config.broadcast_timeout(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_consensus::RulesKind;
    use tessera_nullables::NullStore;
    use tessera_types::PublicKey;

    #[test]
    fn rules_follow_the_configuration() {
        let config = NodeConfig {
            rules: RulesKind::Voting,
            voters: vec![PublicKey([3u8; 32])],
            ..NodeConfig::default()
        };
        let state = AppState::new(config, Arc::new(NullStore::new())).unwrap();
        assert_eq!(state.rules.name(), "voting");

        let engine = AppState::new(NodeConfig::default(), Arc::new(NullStore::new())).unwrap();
        assert_eq!(engine.rules.name(), "engine");
    }

    #[test]
    fn open_creates_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            data_dir: dir.path().join("ledger"),
            map_size_mb: 16,
            ..NodeConfig::default()
        };
        let state = AppState::open(config).unwrap();
        let bridge = state.bridge().unwrap();
        assert_eq!(bridge.info().last_height, 0);
        assert!(dir.path().join("ledger").exists());
    }
}
