//! Storage layout of committed transactions.
//!
//! A transaction is split in three before it is written:
//! - the **record**: the transaction JSON without `metadata`, and for a
//!   CREATE also without `asset`; a TRANSFER keeps its `{"id": ...}` link
//! - the **asset payload** of a CREATE, keyed by the CREATE's id
//! - the **metadata**, keyed by the transaction id, when present
//!
//! Reading a transaction back reassembles the three parts.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tessera_transactions::{canonical_bytes, AssetLink, Output, Transaction, UtxoEntry};
use tessera_types::TxHash;

use crate::LedgerError;

/// The three stored parts of one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredTransaction {
    pub id: TxHash,
    pub record: Vec<u8>,
    pub asset: Option<Vec<u8>>,
    pub metadata: Option<Vec<u8>>,
}

/// Split a transaction into record, asset payload and metadata.
pub fn split_transaction(tx: &Transaction) -> StoredTransaction {
    let mut value = tx.to_value();
    let mut asset = None;
    if let Value::Object(map) = &mut value {
        map.remove("metadata");
        if tx.is_create() {
            asset = map
                .remove("asset")
                .and_then(|mut a| a.get_mut("data").map(Value::take))
                .map(|data| canonical_bytes(&data));
        }
    }
    let metadata = tx
        .metadata
        .as_ref()
        .filter(|m| !m.is_null())
        .map(canonical_bytes);

    StoredTransaction {
        id: tx.id,
        record: canonical_bytes(&value),
        asset,
        metadata,
    }
}

/// Rebuild a transaction from its stored parts.
///
/// A record without an `asset` field is a CREATE and needs its payload.
pub fn assemble_transaction(
    record: &[u8],
    asset: Option<&[u8]>,
    metadata: Option<&[u8]>,
) -> Result<Transaction, LedgerError> {
    let mut map: Map<String, Value> = serde_json::from_slice(record)?;

    if !map.contains_key("asset") {
        let data = asset.ok_or_else(|| {
            LedgerError::Corruption("CREATE record has no stored asset payload".into())
        })?;
        let data: Value = serde_json::from_slice(data)?;
        map.insert("asset".into(), json!({ "data": data }));
    }

    let metadata = match metadata {
        Some(bytes) => serde_json::from_slice(bytes)?,
        None => Value::Null,
    };
    map.insert("metadata".into(), metadata);

    Ok(serde_json::from_value(Value::Object(map))?)
}

/// The fields of a stored record needed to describe its outputs.
#[derive(Deserialize)]
struct RecordOutputs {
    id: TxHash,
    outputs: Vec<Output>,
    #[serde(default)]
    asset: Option<AssetLink>,
}

/// Describe output `index` of a stored record, whether or not it was spent
/// since.
pub fn record_output(record: &[u8], index: u32) -> Result<Option<UtxoEntry>, LedgerError> {
    let parsed: RecordOutputs = serde_json::from_slice(record)?;
    let asset_id = parsed.asset.map(|link| link.id).unwrap_or(parsed.id);
    Ok(parsed
        .outputs
        .into_iter()
        .nth(index as usize)
        .map(|output| UtxoEntry {
            owners: output.public_keys,
            amount: output.amount,
            asset_id,
        }))
}
