//! Unspent-output storage trait.

use crate::StoreError;
use tessera_types::OutputRef;

/// The durable unspent-output set. Entries are serialized by the caller.
pub trait UtxoStore {
    fn put_utxo(&self, at: &OutputRef, entry: &[u8]) -> Result<(), StoreError>;

    fn delete_utxo(&self, at: &OutputRef) -> Result<(), StoreError>;

    fn get_utxo(&self, at: &OutputRef) -> Result<Vec<u8>, StoreError>;

    /// Every unspent entry, ordered by output reference.
    fn iter_utxos(&self) -> Result<Vec<(OutputRef, Vec<u8>)>, StoreError>;

    fn utxo_count(&self) -> Result<u64, StoreError>;
}
