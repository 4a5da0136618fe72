//! Transactions of the tessera ledger and their validation pipeline.
//!
//! Two operations exist:
//! - **CREATE**: introduces a new asset. Its single input is signed by the
//!   creators; its outputs hand amounts of the asset to new owners.
//! - **TRANSFER**: spends earlier outputs of one asset and re-assigns the same
//!   total amount to new owners.
//!
//! A transaction is identified by the Blake2b hash of its canonical JSON body
//! (see [`codec`]). Validation against an unspent-output snapshot lives in
//! [`validation`]; the snapshot itself is abstracted by [`view::UtxoView`].

pub mod builder;
pub mod codec;
pub mod error;
pub mod validation;
pub mod view;

pub use codec::{canonical_bytes, decode_transaction, encode_transaction};
pub use error::{TransactionError, ValidationError};
pub use validation::{validate_transaction, ValidatedTransaction};
pub use view::{UtxoEntry, UtxoView, ViewError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_types::{OutputRef, PublicKey, Signature, TxHash};

/// The only transaction format version this ledger accepts.
pub const TRANSACTION_VERSION: &str = "2.0";

/// Transaction operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Transfer,
}

/// An input: a claim on an earlier output (TRANSFER) or the creators'
/// authorization (CREATE).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Input {
    /// Keys expected to authorize this input.
    pub owners_before: Vec<PublicKey>,
    /// The output being spent. Always `None` on CREATE.
    pub fulfills: Option<OutputRef>,
    /// One signature per entry of `owners_before`, in the same order.
    #[serde(default)]
    pub fulfillment: Vec<Signature>,
}

/// An output: an amount of the asset locked to a set of owners. Every listed
/// key must sign to spend it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Output {
    pub amount: u64,
    pub public_keys: Vec<PublicKey>,
}

/// Asset payload carried by a CREATE.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetDefinition {
    pub data: Value,
}

/// Reference to the CREATE that introduced the asset, carried by a TRANSFER.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetLink {
    pub id: TxHash,
}

/// The `asset` field: `{"data": ...}` on CREATE, `{"id": ...}` on TRANSFER.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Asset {
    Define(AssetDefinition),
    Link(AssetLink),
}

/// A signed ledger transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    pub id: TxHash,
    pub version: String,
    pub operation: Operation,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub asset: Asset,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl Transaction {
    pub fn is_create(&self) -> bool {
        self.operation == Operation::Create
    }

    /// Id of the asset this transaction moves: its own id for a CREATE, the
    /// linked id for a TRANSFER. `None` only for malformed transactions whose
    /// asset shape does not match the operation.
    pub fn asset_id(&self) -> Option<TxHash> {
        match (&self.operation, &self.asset) {
            (Operation::Create, Asset::Define(_)) => Some(self.id),
            (Operation::Transfer, Asset::Link(link)) => Some(link.id),
            _ => None,
        }
    }

    /// Asset payload of a CREATE.
    pub fn asset_data(&self) -> Option<&Value> {
        match &self.asset {
            Asset::Define(def) => Some(&def.data),
            Asset::Link(_) => None,
        }
    }

    /// Outputs consumed by this transaction, in input order.
    pub fn spent_outputs(&self) -> Vec<OutputRef> {
        self.inputs.iter().filter_map(|input| input.fulfills).collect()
    }

    /// Reference to output `index` of this transaction.
    pub fn output_ref(&self, index: u32) -> OutputRef {
        OutputRef::new(self.id, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(b: u8) -> PublicKey {
        PublicKey([b; 32])
    }

    #[test]
    fn asset_id_of_create_is_own_id() {
        let mut tx = Transaction::create(&[key(1)], vec![(vec![key(2)], 1)], None, None);
        tx.id = TxHash::new([5u8; 32]);
        assert_eq!(tx.asset_id(), Some(TxHash::new([5u8; 32])));
    }

    #[test]
    fn asset_id_of_transfer_is_link() {
        let asset = TxHash::new([8u8; 32]);
        let tx = Transaction::transfer(
            vec![(OutputRef::new(asset, 0), vec![key(2)])],
            vec![(vec![key(3)], 1)],
            asset,
            None,
        );
        assert_eq!(tx.asset_id(), Some(asset));
        assert_eq!(tx.spent_outputs(), vec![OutputRef::new(asset, 0)]);
    }

    #[test]
    fn asset_shapes_deserialize_by_field() {
        let define: Asset = serde_json::from_value(json!({"data": {"k": 1}})).unwrap();
        assert!(matches!(define, Asset::Define(_)));
        let link: Asset = serde_json::from_value(json!({"id": "11".repeat(32)})).unwrap();
        assert!(matches!(link, Asset::Link(_)));
        assert!(serde_json::from_value::<Asset>(json!({"other": 1})).is_err());
    }

    #[test]
    fn operation_is_uppercase_on_the_wire() {
        assert_eq!(
            serde_json::to_value(Operation::Transfer).unwrap(),
            json!("TRANSFER")
        );
    }
}
