//! LMDB implementation of BlockStore.

use tessera_store::{BlockStore, StoreError};

use crate::{LmdbEnvironment, LmdbError};

impl BlockStore for LmdbEnvironment {
    fn put_block(&self, height: u64, block: &[u8]) -> Result<(), StoreError> {
        self.write(|batch| batch.put_block(height, block))
    }

    fn get_block(&self, height: u64) -> Result<Vec<u8>, StoreError> {
        self.read(&self.blocks_db, &height.to_be_bytes(), || {
            format!("block at height {height}")
        })
    }

    fn get_latest_block(&self) -> Result<Option<(u64, Vec<u8>)>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let Some((key, value)) = self.blocks_db.last(&rtxn).map_err(LmdbError::from)? else {
            return Ok(None);
        };
        let height: [u8; 8] = key.try_into().map_err(|_| {
            StoreError::Corruption(format!("block key has {} bytes, expected 8", key.len()))
        })?;
        Ok(Some((u64::from_be_bytes(height), value.to_vec())))
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        self.count(&self.blocks_db)
    }
}
