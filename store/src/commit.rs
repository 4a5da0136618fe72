//! The atomic unit of block persistence.

use tessera_types::{OutputRef, TxHash};

use crate::{
    AssetStore, BlockStore, MetaStore, MetadataStore, StoreError, TransactionStore, UtxoStore,
};

/// Everything one block commit writes.
///
/// A backend applies a `CommitSet` all-or-nothing: after a crash either every
/// field is visible or none is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitSet {
    pub height: u64,
    pub block: Vec<u8>,
    pub transactions: Vec<(TxHash, Vec<u8>)>,
    pub assets: Vec<(TxHash, Vec<u8>)>,
    pub metadata: Vec<(TxHash, Vec<u8>)>,
    /// Outputs removed from the unspent set.
    pub utxo_spent: Vec<OutputRef>,
    /// Outputs added to the unspent set.
    pub utxo_created: Vec<(OutputRef, Vec<u8>)>,
    pub meta: Vec<(String, Vec<u8>)>,
}

impl CommitSet {
    pub fn new(height: u64, block: Vec<u8>) -> Self {
        Self {
            height,
            block,
            ..Default::default()
        }
    }
}

/// A backend holding every store the ledger needs.
pub trait LedgerStore:
    TransactionStore + AssetStore + MetadataStore + BlockStore + UtxoStore + MetaStore + Send + Sync
{
    /// Apply `commit` atomically.
    ///
    /// Outputs created and spent by the same commit are inserted first and
    /// removed second, so they end up absent.
    fn apply_commit(&self, commit: &CommitSet) -> Result<(), StoreError>;
}
