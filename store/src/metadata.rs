//! Per-transaction metadata storage trait.

use crate::StoreError;
use tessera_types::TxHash;

pub trait MetadataStore {
    fn put_metadata(&self, tx_id: &TxHash, metadata: &[u8]) -> Result<(), StoreError>;

    fn get_metadata(&self, tx_id: &TxHash) -> Result<Vec<u8>, StoreError>;
}
