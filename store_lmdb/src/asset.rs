//! LMDB implementation of AssetStore.

use tessera_store::{AssetStore, StoreError};
use tessera_types::TxHash;

use crate::LmdbEnvironment;

impl AssetStore for LmdbEnvironment {
    fn put_asset(&self, asset_id: &TxHash, data: &[u8]) -> Result<(), StoreError> {
        self.write(|batch| batch.put_asset(asset_id, data))
    }

    fn get_asset(&self, asset_id: &TxHash) -> Result<Vec<u8>, StoreError> {
        self.read(&self.assets_db, asset_id.as_bytes(), || {
            format!("asset {asset_id}")
        })
    }

    fn asset_exists(&self, asset_id: &TxHash) -> Result<bool, StoreError> {
        self.contains(&self.assets_db, asset_id.as_bytes())
    }
}
