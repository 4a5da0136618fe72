//! Canonical and wire encodings of a transaction.
//!
//! - **Canonical JSON**: object keys sorted, no insignificant whitespace. It
//!   is the pre-image of the transaction id and of every ownership signature,
//!   so two replicas always hash the same bytes.
//! - **Wire form**: base64 of the canonical JSON, as submitted to and handed
//!   back by the consensus engine.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tessera_crypto::hash_transaction;
use tessera_types::TxHash;

use crate::{Transaction, TransactionError};

/// Serialize a JSON value canonically.
///
/// `serde_json::Map` is ordered by key unless the `preserve_order` feature is
/// enabled, which this workspace never does.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

impl Transaction {
    /// Full JSON value of the transaction, `id` included.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("Transaction is always serializable to JSON")
    }

    /// JSON body without the `id` key.
    fn body_value(&self) -> Value {
        let mut value = self.to_value();
        if let Some(map) = value.as_object_mut() {
            map.remove("id");
        }
        value
    }

    /// Canonical encoding of the body the id commits to (signatures included).
    pub fn canonical_body(&self) -> Vec<u8> {
        canonical_bytes(&self.body_value())
    }

    /// Recompute the id from the current body.
    pub fn compute_id(&self) -> TxHash {
        hash_transaction(&self.canonical_body())
    }

    /// Message every owner signs: the body with all fulfillments emptied.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut unsigned = self.clone();
        for input in &mut unsigned.inputs {
            input.fulfillment.clear();
        }
        canonical_bytes(&unsigned.body_value())
    }

    /// Canonical encoding of the whole transaction, `id` included.
    pub fn to_canonical_json(&self) -> Vec<u8> {
        canonical_bytes(&self.to_value())
    }

    /// Parse a transaction from JSON bytes. Only structure is checked here.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Encode a transaction into its wire form.
pub fn encode_transaction(tx: &Transaction) -> String {
    STANDARD.encode(tx.to_canonical_json())
}

/// Decode the wire form handed over by the consensus engine.
pub fn decode_transaction(raw: &[u8]) -> Result<Transaction, TransactionError> {
    let json = STANDARD.decode(raw)?;
    Transaction::from_json_bytes(&json)
}
