//! Per-block buffer of delivered transactions and the view it induces.
//!
//! Transactions delivered within one block see each other's effects through
//! an [`OverlayView`]: the committed snapshot with this block's spends
//! removed and creations added. Nothing here touches durable state.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tessera_transactions::{UtxoEntry, UtxoView, ValidatedTransaction, ViewError};
use tessera_types::{OutputRef, TxHash};

use crate::LedgerError;

/// Transactions accepted into the block being built, in delivery order, and
/// their provisional UTXO effects.
#[derive(Clone, Debug, Default)]
pub struct PendingUtxo {
    transactions: Vec<ValidatedTransaction>,
    ids: HashSet<TxHash>,
    assets: HashSet<TxHash>,
    spent: BTreeSet<OutputRef>,
    created: BTreeMap<OutputRef, UtxoEntry>,
}

impl PendingUtxo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a validated transaction.
    ///
    /// Fails without recording anything if the id is already buffered or one
    /// of its spends was consumed earlier in the block.
    pub fn record(&mut self, validated: ValidatedTransaction) -> Result<(), LedgerError> {
        let id = validated.transaction.id;
        if self.ids.contains(&id) {
            return Err(LedgerError::DuplicateInBlock(id));
        }
        let mut seen = BTreeSet::new();
        for at in &validated.spends {
            if self.spent.contains(at) || !seen.insert(*at) {
                return Err(LedgerError::AlreadySpent(*at));
            }
        }

        self.spent.extend(validated.spends.iter().copied());
        for (at, entry) in &validated.creates {
            self.created.insert(*at, entry.clone());
        }
        if validated.transaction.is_create() {
            self.assets.insert(id);
        }
        self.ids.insert(id);
        self.transactions.push(validated);
        Ok(())
    }

    pub fn contains_transaction(&self, id: &TxHash) -> bool {
        self.ids.contains(id)
    }

    pub fn transactions(&self) -> &[ValidatedTransaction] {
        &self.transactions
    }

    /// Buffered ids in delivery order.
    pub fn transaction_ids(&self) -> Vec<TxHash> {
        self.transactions.iter().map(|v| v.transaction.id).collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Committed outputs this block consumes.
    pub fn spent_from_base(&self) -> impl Iterator<Item = &OutputRef> {
        self.spent.iter().filter(|at| !self.created.contains_key(at))
    }

    /// Outputs this block creates that are still unspent at its end.
    pub fn created_unspent(&self) -> impl Iterator<Item = (&OutputRef, &UtxoEntry)> {
        self.created.iter().filter(|(at, _)| !self.spent.contains(at))
    }

    /// Layer this buffer over a committed snapshot.
    pub fn view<'a, B: UtxoView + ?Sized>(&'a self, base: &'a B) -> OverlayView<'a, B> {
        OverlayView {
            base,
            pending: self,
        }
    }
}

/// A committed snapshot as mutated by the transactions already buffered in
/// the current block.
pub struct OverlayView<'a, B: ?Sized> {
    base: &'a B,
    pending: &'a PendingUtxo,
}

impl<B: UtxoView + ?Sized> UtxoView for OverlayView<'_, B> {
    fn output(&self, at: &OutputRef) -> Result<Option<UtxoEntry>, ViewError> {
        match self.pending.created.get(at) {
            Some(entry) => Ok(Some(entry.clone())),
            None => self.base.output(at),
        }
    }

    fn is_unspent(&self, at: &OutputRef) -> Result<bool, ViewError> {
        if self.pending.spent.contains(at) {
            return Ok(false);
        }
        if self.pending.created.contains_key(at) {
            return Ok(true);
        }
        self.base.is_unspent(at)
    }

    fn asset_exists(&self, asset_id: &TxHash) -> Result<bool, ViewError> {
        if self.pending.assets.contains(asset_id) {
            return Ok(true);
        }
        self.base.asset_exists(asset_id)
    }

    fn transaction_exists(&self, id: &TxHash) -> Result<bool, ViewError> {
        if self.pending.ids.contains(id) {
            return Ok(true);
        }
        self.base.transaction_exists(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UtxoSet;
    use tessera_crypto::keypair_from_seed;
    use tessera_transactions::{validate_transaction, Transaction, ValidationError};

    /// A bare UTXO set with no history, enough for in-block tests.
    struct SetView(UtxoSet);

    impl UtxoView for SetView {
        fn output(&self, at: &OutputRef) -> Result<Option<UtxoEntry>, ViewError> {
            Ok(self.0.get(at).cloned())
        }
        fn is_unspent(&self, at: &OutputRef) -> Result<bool, ViewError> {
            Ok(self.0.contains(at))
        }
        fn asset_exists(&self, _asset_id: &TxHash) -> Result<bool, ViewError> {
            Ok(false)
        }
        fn transaction_exists(&self, _id: &TxHash) -> Result<bool, ViewError> {
            Ok(false)
        }
    }

    #[test]
    fn create_then_transfer_in_one_block() {
        let alice = keypair_from_seed(&[1u8; 32]);
        let bob = keypair_from_seed(&[2u8; 32]);
        let base = SetView(UtxoSet::new());
        let mut pending = PendingUtxo::new();

        let create = Transaction::create(&[alice.public], vec![(vec![bob.public], 2)], None, None)
            .sign(&[&alice])
            .unwrap();
        let v = validate_transaction(&create, &pending.view(&base)).unwrap();
        pending.record(v).unwrap();

        let transfer = Transaction::transfer(
            vec![(create.output_ref(0), vec![bob.public])],
            vec![(vec![alice.public], 2)],
            create.id,
            None,
        )
        .sign(&[&bob])
        .unwrap();
        let v = validate_transaction(&transfer, &pending.view(&base)).unwrap();
        pending.record(v).unwrap();

        assert_eq!(pending.transaction_ids(), vec![create.id, transfer.id]);
        assert_eq!(pending.spent_from_base().count(), 0);
        let created: Vec<_> = pending.created_unspent().map(|(at, _)| *at).collect();
        assert_eq!(created, vec![transfer.output_ref(0)]);

        let err = validate_transaction(&transfer, &pending.view(&base)).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateTransaction(transfer.id));
    }

    #[test]
    fn record_rejects_duplicates_without_mutation() {
        let alice = keypair_from_seed(&[1u8; 32]);
        let create = Transaction::create(&[alice.public], vec![(vec![alice.public], 1)], None, None)
            .sign(&[&alice])
            .unwrap();
        let base = SetView(UtxoSet::new());
        let v = validate_transaction(&create, &base).unwrap();

        let mut pending = PendingUtxo::new();
        pending.record(v.clone()).unwrap();
        assert!(matches!(
            pending.record(v),
            Err(LedgerError::DuplicateInBlock(id)) if id == create.id
        ));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.created_unspent().count(), 1);
    }
}
