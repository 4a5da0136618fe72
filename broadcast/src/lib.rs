//! Submission of transactions to the consensus engine.
//!
//! A transaction is encoded to its wire form and posted as a JSON-RPC call
//! whose method names the delivery guarantee the caller waits for:
//! - `broadcast_tx_async`: returns once the engine received it
//! - `broadcast_tx_sync`: returns after the mempool check
//! - `broadcast_tx_commit`: returns after the block holding it committed

pub mod client;
pub mod error;
pub mod mode;
pub mod transport;

pub use client::BroadcastClient;
pub use error::BroadcastError;
pub use mode::WriteMode;
pub use transport::{HttpTransport, RpcTransport};
