//! Tessera node: the application side of a BFT consensus engine.
//!
//! The node owns the ledger and exposes it to the engine through the
//! [`ConsensusBridge`]:
//! - `check_tx` gates mempool admission (advisory)
//! - `deliver_tx` validates transactions in the engine's block order
//! - `commit` persists a block atomically and advances the app hash
//!
//! Around the bridge sit the start-up [`AppState`], configuration, logging,
//! metrics, legacy peer replication and an offline chain verifier.

pub mod app_state;
pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod replay;
pub mod replicator;
pub mod shutdown;
pub mod tracing_spans;

pub use app_state::{broadcast_client, AppState};
pub use bridge::{
    commit_within, BlockHeader, ConsensusBridge, CrossCheck, Info, QueryResponse, SharedBridge,
    TxResult,
};
pub use config::{Genesis, NodeConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use replay::{verify_chain, ChainReport};
pub use replicator::{
    forward_backlog, spawn_peer_listeners, ChangeFeed, FileFeed, Replicator, WriteOutcome,
};
pub use shutdown::ShutdownController;
