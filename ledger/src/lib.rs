//! Durable ledger state of a tessera node.
//!
//! The ledger is a chain of blocks, each committing an ordered list of
//! transactions, plus the unspent-output set those transactions leave behind.
//! Blocks are produced by the consensus engine's commit cycle; this crate
//! only knows how to hash them, store them and replay them.

pub mod block;
pub mod error;
pub mod ledger;
pub mod overlay;
pub mod records;
pub mod utxo;
pub mod view;

pub use block::{compute_app_hash, Block, GENESIS_APP_HASH};
pub use error::LedgerError;
pub use ledger::{Ledger, LedgerSummary};
pub use overlay::{OverlayView, PendingUtxo};
pub use records::{assemble_transaction, split_transaction, StoredTransaction};
pub use utxo::UtxoSet;
pub use view::{CommittedView, StoreView};
