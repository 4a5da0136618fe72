//! Abstract storage traits for the tessera ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits. Values are
//! opaque bytes; the ledger crate owns their encoding.

pub mod asset;
pub mod block;
pub mod commit;
pub mod error;
pub mod meta;
pub mod metadata;
pub mod transaction;
pub mod utxo;

pub use asset::AssetStore;
pub use block::BlockStore;
pub use commit::{CommitSet, LedgerStore};
pub use error::StoreError;
pub use meta::MetaStore;
pub use metadata::MetadataStore;
pub use transaction::TransactionStore;
pub use utxo::UtxoStore;
