//! Block storage trait.

use crate::StoreError;

/// Committed blocks, keyed by height.
pub trait BlockStore {
    /// Store a block (serialized bytes keyed by height).
    fn put_block(&self, height: u64, block: &[u8]) -> Result<(), StoreError>;

    /// Retrieve the block committed at `height`.
    fn get_block(&self, height: u64) -> Result<Vec<u8>, StoreError>;

    /// The highest committed block, or `None` before the first commit.
    fn get_latest_block(&self) -> Result<Option<(u64, Vec<u8>)>, StoreError>;

    /// Total number of blocks in the store.
    fn block_count(&self) -> Result<u64, StoreError>;
}
