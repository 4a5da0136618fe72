//! Transaction record storage trait.

use crate::StoreError;
use tessera_types::TxHash;

/// Committed transaction records, keyed by transaction id.
///
/// Records never carry the asset payload or the metadata; those live in
/// [`crate::AssetStore`] and [`crate::MetadataStore`].
pub trait TransactionStore {
    /// Store a transaction record.
    fn put_transaction(&self, id: &TxHash, record: &[u8]) -> Result<(), StoreError>;

    /// Retrieve a transaction record by id.
    fn get_transaction(&self, id: &TxHash) -> Result<Vec<u8>, StoreError>;

    /// Check if a transaction exists.
    fn exists(&self, id: &TxHash) -> Result<bool, StoreError>;

    /// Total number of committed transactions.
    fn transaction_count(&self) -> Result<u64, StoreError>;
}
