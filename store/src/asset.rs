//! Asset payload storage trait.

use crate::StoreError;
use tessera_types::TxHash;

/// Asset payloads, stored once and keyed by the id of the CREATE that
/// introduced them.
pub trait AssetStore {
    fn put_asset(&self, asset_id: &TxHash, data: &[u8]) -> Result<(), StoreError>;

    fn get_asset(&self, asset_id: &TxHash) -> Result<Vec<u8>, StoreError>;

    fn asset_exists(&self, asset_id: &TxHash) -> Result<bool, StoreError>;
}
