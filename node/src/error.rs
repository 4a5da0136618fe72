use thiserror::Error;

use tessera_types::BlockHash;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] tessera_ledger::LedgerError),

    #[error("consensus error: {0}")]
    Consensus(#[from] tessera_consensus::ConsensusError),

    #[error("store error: {0}")]
    Store(#[from] tessera_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] tessera_store_lmdb::LmdbError),

    #[error("broadcast error: {0}")]
    Broadcast(#[from] tessera_broadcast::BroadcastError),

    /// Persisting a block failed. Committed state is unchanged and the block
    /// buffer is kept, so the engine's crash recovery can retry the height.
    #[error("commit of height {height} failed: {reason}")]
    StorageFailure { height: u64, reason: String },

    #[error("genesis digest {provided} does not match stored digest {stored}")]
    GenesisMismatch { stored: BlockHash, provided: BlockHash },

    #[error("chain verification failed at height {height}: {reason}")]
    ChainInvalid { height: u64, reason: String },

    #[error("commit did not finish within {after_ms} ms")]
    CommitTimeout { after_ms: u64 },

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("node not initialized")]
    NotInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown timeout")]
    ShutdownTimeout,

    #[error("{0}")]
    Other(String),
}
