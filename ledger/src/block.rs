//! Committed blocks and the app-hash chain.
//!
//! The app hash summarizes everything a replica has committed:
//!
//! ```text
//! app_hash(0) = 0^32
//! app_hash(h) = Blake2b-256(app_hash(h-1) ‖ tx_id_1 ‖ … ‖ tx_id_n ‖ h as u64 BE)
//! ```
//!
//! Two replicas that applied the same transactions in the same order report
//! the same app hash, whatever their clocks said.

use serde::{Deserialize, Serialize};
use tessera_crypto::{blake2b_256_multi, hash_block};
use tessera_types::{BlockHash, Timestamp, TxHash};

use crate::LedgerError;

/// App hash of the empty chain, before any commit.
pub const GENESIS_APP_HASH: BlockHash = BlockHash::ZERO;

/// Chain the app hash forward over one block's ordered transaction ids.
pub fn compute_app_hash(prev: &BlockHash, transaction_ids: &[TxHash], height: u64) -> BlockHash {
    let height_bytes = height.to_be_bytes();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(transaction_ids.len() + 2);
    parts.push(prev.as_bytes());
    parts.extend(transaction_ids.iter().map(|id| id.as_bytes().as_slice()));
    parts.push(&height_bytes);
    BlockHash::new(blake2b_256_multi(&parts))
}

/// One commit cycle's worth of ledger history. Immutable once stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub app_hash: BlockHash,
    pub transaction_ids: Vec<TxHash>,
    pub timestamp: Timestamp,
}

impl Block {
    /// Build the successor of a block at `prev_height` with `prev_app_hash`.
    pub fn next(
        prev_height: u64,
        prev_app_hash: &BlockHash,
        transaction_ids: Vec<TxHash>,
        timestamp: Timestamp,
    ) -> Self {
        let height = prev_height + 1;
        Self {
            height,
            app_hash: compute_app_hash(prev_app_hash, &transaction_ids, height),
            transaction_ids,
            timestamp,
        }
    }

    /// Block id: `Blake2b-256(height ‖ app_hash)`.
    pub fn id(&self) -> BlockHash {
        hash_block(self.height, self.app_hash.as_bytes())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heights_advance_by_one() {
        let b1 = Block::next(0, &GENESIS_APP_HASH, vec![], Timestamp::new(10));
        let b2 = Block::next(b1.height, &b1.app_hash, vec![], Timestamp::new(11));
        assert_eq!(b1.height, 1);
        assert_eq!(b2.height, b1.height + 1);
    }

    #[test]
    fn app_hash_ignores_timestamp() {
        let ids = vec![TxHash::new([1u8; 32])];
        let a = Block::next(0, &GENESIS_APP_HASH, ids.clone(), Timestamp::new(1));
        let b = Block::next(0, &GENESIS_APP_HASH, ids, Timestamp::new(99));
        assert_eq!(a.app_hash, b.app_hash);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn app_hash_depends_on_order() {
        let x = TxHash::new([1u8; 32]);
        let y = TxHash::new([2u8; 32]);
        assert_ne!(
            compute_app_hash(&GENESIS_APP_HASH, &[x, y], 1),
            compute_app_hash(&GENESIS_APP_HASH, &[y, x], 1)
        );
    }

    #[test]
    fn empty_block_still_moves_the_chain() {
        let h1 = compute_app_hash(&GENESIS_APP_HASH, &[], 1);
        let h2 = compute_app_hash(&h1, &[], 2);
        assert_ne!(h1, GENESIS_APP_HASH);
        assert_ne!(h1, h2);
    }

    #[test]
    fn bytes_roundtrip() {
        let block = Block::next(
            4,
            &BlockHash::new([3u8; 32]),
            vec![TxHash::new([5u8; 32])],
            Timestamp::new(1_700_000_000),
        );
        assert_eq!(Block::from_bytes(&block.to_bytes().unwrap()).unwrap(), block);
    }
}
