//! References to transaction outputs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TxHash;

/// Points at output `output_index` of transaction `transaction_id`.
///
/// This is the key of the unspent-output set and the `fulfills` field of a
/// transfer input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    pub transaction_id: TxHash,
    pub output_index: u32,
}

impl OutputRef {
    /// Length of the binary storage key.
    pub const KEY_LEN: usize = 36;

    pub fn new(transaction_id: TxHash, output_index: u32) -> Self {
        Self {
            transaction_id,
            output_index,
        }
    }

    /// Binary key: 32-byte transaction id followed by the big-endian index,
    /// so that outputs of one transaction sort together.
    pub fn to_key(&self) -> [u8; Self::KEY_LEN] {
        let mut key = [0u8; Self::KEY_LEN];
        key[..32].copy_from_slice(self.transaction_id.as_bytes());
        key[32..].copy_from_slice(&self.output_index.to_be_bytes());
        key
    }

    /// Inverse of [`OutputRef::to_key`]. Returns `None` on a malformed key.
    pub fn from_key(key: &[u8]) -> Option<Self> {
        if key.len() != Self::KEY_LEN {
            return None;
        }
        let mut id = [0u8; 32];
        id.copy_from_slice(&key[..32]);
        let mut index = [0u8; 4];
        index.copy_from_slice(&key[32..]);
        Some(Self::new(TxHash::new(id), u32::from_be_bytes(index)))
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transaction_id, self.output_index)
    }
}
