//! Block proposals and votes of the majority-voting mode.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tessera_crypto::{blake2b_256_multi, sign_message};
use tessera_transactions::{canonical_bytes, Transaction};
use tessera_types::{BlockHash, KeyPair, PublicKey, Signature};

/// A block as received for cross-checking or replay.
///
/// `proposer` and `signature` are only meaningful under voting rules.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockProposal {
    pub height: u64,
    pub transactions: Vec<Transaction>,
    pub proposer: Option<PublicKey>,
    pub signature: Option<Signature>,
    committed: bool,
}

impl BlockProposal {
    /// A block proposed by someone else, to be checked before it is trusted.
    pub fn new(height: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            height,
            transactions,
            proposer: None,
            signature: None,
            committed: false,
        }
    }

    /// A block read back from this node's own chain. Consensus finalized it
    /// already and the store keeps no proposer, so only its content is
    /// checked again.
    pub fn committed(height: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            committed: true,
            ..Self::new(height, transactions)
        }
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Proposal id: `Blake2b-256(height BE ‖ tx_id_1 ‖ … ‖ tx_id_n)`.
    pub fn id(&self) -> BlockHash {
        let height = self.height.to_be_bytes();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(self.transactions.len() + 1);
        parts.push(&height);
        parts.extend(self.transactions.iter().map(|tx| tx.id.as_bytes().as_slice()));
        BlockHash::new(blake2b_256_multi(&parts))
    }

    /// Sign the proposal id as `key`.
    pub fn signed_by(mut self, key: &KeyPair) -> Self {
        self.signature = Some(sign_message(self.id().as_bytes(), &key.private));
        self.proposer = Some(key.public);
        self
    }
}

/// One voter's verdict on one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_public_key: PublicKey,
    pub block_id: BlockHash,
    pub is_valid: bool,
    pub signature: Signature,
}

impl Vote {
    /// Bytes a voter signs: canonical JSON of `{block_id, is_valid}`.
    pub fn signing_message(block_id: &BlockHash, is_valid: bool) -> Vec<u8> {
        canonical_bytes(&json!({
            "block_id": block_id.to_string(),
            "is_valid": is_valid,
        }))
    }

    pub fn new(block_id: BlockHash, is_valid: bool, voter: &KeyPair) -> Self {
        let message = Self::signing_message(&block_id, is_valid);
        Self {
            voter_public_key: voter.public,
            block_id,
            is_valid,
            signature: sign_message(&message, &voter.private),
        }
    }
}
