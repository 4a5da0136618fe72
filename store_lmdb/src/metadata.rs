//! LMDB implementation of MetadataStore.

use tessera_store::{MetadataStore, StoreError};
use tessera_types::TxHash;

use crate::LmdbEnvironment;

impl MetadataStore for LmdbEnvironment {
    fn put_metadata(&self, tx_id: &TxHash, metadata: &[u8]) -> Result<(), StoreError> {
        self.write(|batch| batch.put_metadata(tx_id, metadata))
    }

    fn get_metadata(&self, tx_id: &TxHash) -> Result<Vec<u8>, StoreError> {
        self.read(&self.metadata_db, tx_id.as_bytes(), || {
            format!("metadata of {tx_id}")
        })
    }
}
