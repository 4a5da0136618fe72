//! LMDB implementation of TransactionStore.

use tessera_store::{StoreError, TransactionStore};
use tessera_types::TxHash;

use crate::LmdbEnvironment;

impl TransactionStore for LmdbEnvironment {
    fn put_transaction(&self, id: &TxHash, record: &[u8]) -> Result<(), StoreError> {
        self.write(|batch| batch.put_transaction(id, record))
    }

    fn get_transaction(&self, id: &TxHash) -> Result<Vec<u8>, StoreError> {
        self.read(&self.transactions_db, id.as_bytes(), || {
            format!("transaction {id}")
        })
    }

    fn exists(&self, id: &TxHash) -> Result<bool, StoreError> {
        self.contains(&self.transactions_db, id.as_bytes())
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        self.count(&self.transactions_db)
    }
}
