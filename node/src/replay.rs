//! Offline verification of a stored chain.
//!
//! Replays every stored block from height 1 on a fresh UTXO set, checking
//! that each block's transactions are still valid in order, that the
//! app-hash chain recomputes to the stored values, and that the final UTXO
//! set equals the one the store holds.

use std::collections::HashSet;

use tessera_consensus::{BlockProposal, ConsensusRules};
use tessera_ledger::{compute_app_hash, Ledger, UtxoSet, GENESIS_APP_HASH};
use tessera_store::LedgerStore;
use tessera_transactions::{UtxoEntry, UtxoView, ViewError};
use tessera_types::{BlockHash, OutputRef, TxHash};

use crate::tracing_spans::verify_block_span;
use crate::NodeError;

/// Summary of a successful verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainReport {
    pub height: u64,
    pub transactions: u64,
    pub utxos: usize,
    pub app_hash: BlockHash,
}

/// State rebuilt from the blocks replayed so far.
#[derive(Default)]
struct Replayed {
    utxos: UtxoSet,
    transactions: HashSet<TxHash>,
    assets: HashSet<TxHash>,
}

impl UtxoView for Replayed {
    fn output(&self, at: &OutputRef) -> Result<Option<UtxoEntry>, ViewError> {
        Ok(self.utxos.get(at).cloned())
    }

    fn is_unspent(&self, at: &OutputRef) -> Result<bool, ViewError> {
        Ok(self.utxos.contains(at))
    }

    fn asset_exists(&self, asset_id: &TxHash) -> Result<bool, ViewError> {
        Ok(self.assets.contains(asset_id))
    }

    fn transaction_exists(&self, id: &TxHash) -> Result<bool, ViewError> {
        Ok(self.transactions.contains(id))
    }
}

fn invalid(height: u64, reason: impl Into<String>) -> NodeError {
    NodeError::ChainInvalid {
        height,
        reason: reason.into(),
    }
}

/// Replay `ledger`'s stored chain under `rules`.
///
/// Each block goes through [`ConsensusRules::validate_block`] as a
/// [`BlockProposal::committed`]: stored blocks keep no proposer signature,
/// so only their content is judged again.
pub fn verify_chain<S: LedgerStore>(
    ledger: &Ledger<S>,
    rules: &dyn ConsensusRules,
) -> Result<ChainReport, NodeError> {
    let mut state = Replayed::default();
    let mut app_hash = GENESIS_APP_HASH;
    let mut transactions = 0u64;

    for height in 1..=ledger.height() {
        let _span = verify_block_span(height).entered();
        let block = ledger
            .get_block(height)?
            .ok_or_else(|| invalid(height, "block missing"))?;
        if block.height != height {
            return Err(invalid(height, format!("block claims height {}", block.height)));
        }

        let mut body = Vec::with_capacity(block.transaction_ids.len());
        for id in &block.transaction_ids {
            let tx = ledger
                .get_transaction(id)?
                .ok_or_else(|| invalid(height, format!("transaction {id} missing")))?;
            body.push(tx);
        }

        let validated = rules
            .validate_block(&state, &BlockProposal::committed(height, body))
            .map_err(|e| invalid(height, e.to_string()))?;
        for applied in validated {
            for at in &applied.spends {
                state.utxos.spend(at)?;
            }
            for (at, entry) in applied.creates {
                state.utxos.add(at, entry);
            }
            if applied.transaction.is_create() {
                state.assets.insert(applied.transaction.id);
            }
            state.transactions.insert(applied.transaction.id);
        }

        app_hash = compute_app_hash(&app_hash, &block.transaction_ids, height);
        if app_hash != block.app_hash {
            return Err(invalid(
                height,
                format!("app hash {} recomputes to {app_hash}", block.app_hash),
            ));
        }
        transactions += block.transaction_ids.len() as u64;
        tracing::debug!(height, app_hash = %app_hash, "block verified");
    }

    if app_hash != ledger.app_hash() {
        return Err(invalid(ledger.height(), "replayed app hash differs from the ledger's"));
    }
    if state.utxos != *ledger.utxos() {
        return Err(invalid(
            ledger.height(),
            format!(
                "replayed UTXO set has {} entries, store holds {}",
                state.utxos.len(),
                ledger.utxos().len()
            ),
        ));
    }

    tracing::info!(height = ledger.height(), transactions, "chain verified");
    Ok(ChainReport {
        height: ledger.height(),
        transactions,
        utxos: state.utxos.len(),
        app_hash,
    })
}
