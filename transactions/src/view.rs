//! Read-only snapshot of ledger state that validation runs against.

use serde::{Deserialize, Serialize};
use tessera_types::{OutputRef, PublicKey, TxHash};
use thiserror::Error;

/// What an output holds: who may spend it, how much, and of which asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub owners: Vec<PublicKey>,
    pub amount: u64,
    pub asset_id: TxHash,
}

/// The snapshot could not answer. Absence is `Ok(None)`/`Ok(false)`, never
/// this error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("ledger state unreadable: {0}")]
pub struct ViewError(pub String);

/// A snapshot of the ledger as seen by one validation call.
///
/// Implementations decide what "committed" means: the durable UTXO set for
/// mempool checks, the durable set overlaid with the current block's effects
/// for block delivery.
pub trait UtxoView {
    /// Any output the snapshot knows about, spent or not.
    fn output(&self, at: &OutputRef) -> Result<Option<UtxoEntry>, ViewError>;

    /// Whether the output exists and has not been consumed.
    fn is_unspent(&self, at: &OutputRef) -> Result<bool, ViewError>;

    /// Whether a CREATE with this id exists.
    fn asset_exists(&self, asset_id: &TxHash) -> Result<bool, ViewError>;

    /// Whether a transaction with this id has already been accepted.
    fn transaction_exists(&self, id: &TxHash) -> Result<bool, ViewError>;
}
