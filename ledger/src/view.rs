//! Snapshots of committed state for the validation pipeline.
//!
//! A missing key reads as absent. Any other storage error is surfaced as a
//! [`ViewError`] so validation stops instead of deciding on a partial view:
//! reading "absent" for a transaction that exists would accept it twice.

use tessera_store::{LedgerStore, StoreError};
use tessera_transactions::{UtxoEntry, UtxoView, ViewError};
use tessera_types::{OutputRef, TxHash};

use crate::records::record_output;
use crate::utxo::decode_entry;
use crate::UtxoSet;

fn unreadable(what: &str, e: impl std::fmt::Display) -> ViewError {
    tracing::error!(error = %e, what, "store read failed during validation");
    ViewError(format!("{what}: {e}"))
}

/// `Ok(None)` for a missing key, the value otherwise.
fn optional<T>(what: &str, result: Result<T, StoreError>) -> Result<Option<T>, ViewError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(unreadable(what, e)),
    }
}

/// Look up any output, spent or not, in the stored transaction records.
fn stored_output<S: LedgerStore + ?Sized>(
    store: &S,
    at: &OutputRef,
) -> Result<Option<UtxoEntry>, ViewError> {
    let Some(record) = optional("transaction", store.get_transaction(&at.transaction_id))? else {
        return Ok(None);
    };
    record_output(&record, at.output_index).map_err(|e| unreadable("transaction record", e))
}

/// The in-memory UTXO set of the last commit, backed by the store for
/// history.
pub struct CommittedView<'a, S: ?Sized> {
    utxos: &'a UtxoSet,
    store: &'a S,
}

impl<'a, S: LedgerStore + ?Sized> CommittedView<'a, S> {
    pub fn new(utxos: &'a UtxoSet, store: &'a S) -> Self {
        Self { utxos, store }
    }
}

impl<S: LedgerStore + ?Sized> UtxoView for CommittedView<'_, S> {
    fn output(&self, at: &OutputRef) -> Result<Option<UtxoEntry>, ViewError> {
        match self.utxos.get(at) {
            Some(entry) => Ok(Some(entry.clone())),
            None => stored_output(self.store, at),
        }
    }

    fn is_unspent(&self, at: &OutputRef) -> Result<bool, ViewError> {
        Ok(self.utxos.contains(at))
    }

    fn asset_exists(&self, asset_id: &TxHash) -> Result<bool, ViewError> {
        self.store
            .asset_exists(asset_id)
            .map_err(|e| unreadable("asset", e))
    }

    fn transaction_exists(&self, id: &TxHash) -> Result<bool, ViewError> {
        self.store.exists(id).map_err(|e| unreadable("transaction", e))
    }
}

/// A view read entirely from the store, for callers that do not own the
/// in-memory UTXO set.
pub struct StoreView<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: LedgerStore + ?Sized> StoreView<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S: LedgerStore + ?Sized> UtxoView for StoreView<'_, S> {
    fn output(&self, at: &OutputRef) -> Result<Option<UtxoEntry>, ViewError> {
        stored_output(self.store, at)
    }

    fn is_unspent(&self, at: &OutputRef) -> Result<bool, ViewError> {
        match optional("utxo", self.store.get_utxo(at))? {
            Some(bytes) => decode_entry(&bytes)
                .map(|_| true)
                .map_err(|e| unreadable("utxo entry", e)),
            None => Ok(false),
        }
    }

    fn asset_exists(&self, asset_id: &TxHash) -> Result<bool, ViewError> {
        self.store
            .asset_exists(asset_id)
            .map_err(|e| unreadable("asset", e))
    }

    fn transaction_exists(&self, id: &TxHash) -> Result<bool, ViewError> {
        self.store.exists(id).map_err(|e| unreadable("transaction", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tessera_crypto::keypair_from_seed;
    use tessera_nullables::NullStore;
    use tessera_transactions::{validate_transaction, Transaction, ValidationError};
    use tessera_types::Timestamp;

    use crate::{Ledger, PendingUtxo};

    fn committed_create() -> (Arc<NullStore>, Ledger<NullStore>, Transaction) {
        let alice = keypair_from_seed(&[1u8; 32]);
        let create = Transaction::create(&[alice.public], vec![(vec![alice.public], 1)], None, None)
            .sign(&[&alice])
            .unwrap();
        let store = Arc::new(NullStore::new());
        let mut ledger = Ledger::open(Arc::clone(&store)).unwrap();
        let mut pending = PendingUtxo::new();
        pending
            .record(validate_transaction(&create, &ledger.view()).unwrap())
            .unwrap();
        ledger.commit_block(&pending, Timestamp::new(1)).unwrap();
        (store, ledger, create)
    }

    #[test]
    fn committed_view_surfaces_read_failures() {
        let (store, ledger, create) = committed_create();
        store.fail_reads(true);

        let view = ledger.view();
        assert!(view.transaction_exists(&create.id).is_err());
        assert!(view.asset_exists(&create.id).is_err());
        // The in-memory set still answers for live outputs.
        assert_eq!(view.is_unspent(&create.output_ref(0)), Ok(true));
        assert!(matches!(
            validate_transaction(&create, &view),
            Err(ValidationError::Unavailable(_))
        ));
    }

    #[test]
    fn store_view_reads_missing_keys_as_absent() {
        let (store, _, create) = committed_create();
        let view = StoreView::new(store.as_ref());
        assert_eq!(view.transaction_exists(&create.id), Ok(true));
        assert_eq!(view.is_unspent(&create.output_ref(0)), Ok(true));
        assert_eq!(view.is_unspent(&create.output_ref(1)), Ok(false));
        assert_eq!(view.output(&OutputRef::new(TxHash::new([9u8; 32]), 0)), Ok(None));

        store.fail_reads(true);
        assert!(view.is_unspent(&create.output_ref(0)).is_err());
        assert!(view.output(&create.output_ref(0)).is_err());
    }
}
