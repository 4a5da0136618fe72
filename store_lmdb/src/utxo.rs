//! LMDB implementation of UtxoStore.

use tessera_store::{StoreError, UtxoStore};
use tessera_types::OutputRef;

use crate::{LmdbEnvironment, LmdbError};

impl UtxoStore for LmdbEnvironment {
    fn put_utxo(&self, at: &OutputRef, entry: &[u8]) -> Result<(), StoreError> {
        self.write(|batch| batch.put_utxo(at, entry))
    }

    fn delete_utxo(&self, at: &OutputRef) -> Result<(), StoreError> {
        self.write(|batch| batch.delete_utxo(at))
    }

    fn get_utxo(&self, at: &OutputRef) -> Result<Vec<u8>, StoreError> {
        self.read(&self.utxos_db, &at.to_key(), || format!("output {at}"))
    }

    fn iter_utxos(&self) -> Result<Vec<(OutputRef, Vec<u8>)>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let mut entries = Vec::new();
        for item in self.utxos_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, value) = item.map_err(LmdbError::from)?;
            let at = OutputRef::from_key(key).ok_or_else(|| {
                StoreError::Corruption(format!("malformed output key of {} bytes", key.len()))
            })?;
            entries.push((at, value.to_vec()));
        }
        Ok(entries)
    }

    fn utxo_count(&self) -> Result<u64, StoreError> {
        self.count(&self.utxos_db)
    }
}
