//! Blake2b hashing for transaction ids, block ids and app hashes.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use tessera_types::{BlockHash, TxHash};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Derive a block id from its height and app hash.
pub fn hash_block(height: u64, app_hash: &[u8; 32]) -> BlockHash {
    BlockHash::new(blake2b_256_multi(&[&height.to_be_bytes(), app_hash]))
}

/// Hash the canonical encoding of a transaction body to produce its `TxHash`.
pub fn hash_transaction(canonical_body: &[u8]) -> TxHash {
    TxHash::new(blake2b_256(canonical_body))
}
