//! The node's ledger: durable store plus the in-memory UTXO set.

use std::sync::Arc;

use serde_json::Value;
use tessera_store::{CommitSet, LedgerStore, StoreError};
use tessera_transactions::Transaction;
use tessera_types::{BlockHash, Timestamp, TxHash};

use crate::records::{assemble_transaction, split_transaction};
use crate::utxo::{decode_entry, encode_entry};
use crate::{Block, CommittedView, LedgerError, PendingUtxo, UtxoSet, GENESIS_APP_HASH};

/// Summary statistics for the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerSummary {
    pub height: u64,
    pub blocks: u64,
    pub transactions: u64,
    pub utxos: u64,
}

/// Committed ledger state.
///
/// `height`, `app_hash` and the UTXO set always describe the last block the
/// store holds. They move only in [`Ledger::commit_block`], after the store
/// accepted the block.
pub struct Ledger<S> {
    store: Arc<S>,
    utxos: UtxoSet,
    height: u64,
    app_hash: BlockHash,
}

fn optional<T>(result: Result<T, StoreError>) -> Result<Option<T>, LedgerError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl<S: LedgerStore> Ledger<S> {
    /// Load committed state from `store`. An empty store yields height 0 and
    /// the genesis app hash.
    pub fn open(store: Arc<S>) -> Result<Self, LedgerError> {
        let (height, app_hash) = match store.get_latest_block()? {
            Some((height, bytes)) => {
                let block = Block::from_bytes(&bytes)?;
                if block.height != height {
                    return Err(LedgerError::Corruption(format!(
                        "block stored at height {height} claims height {}",
                        block.height
                    )));
                }
                (height, block.app_hash)
            }
            None => (0, GENESIS_APP_HASH),
        };

        let utxos = store
            .iter_utxos()?
            .into_iter()
            .map(|(at, bytes)| decode_entry(&bytes).map(|entry| (at, entry)))
            .collect::<Result<UtxoSet, _>>()?;

        tracing::info!(height, app_hash = %app_hash, utxos = utxos.len(), "ledger loaded");
        Ok(Self {
            store,
            utxos,
            height,
            app_hash,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn app_hash(&self) -> BlockHash {
        self.app_hash
    }

    pub fn utxos(&self) -> &UtxoSet {
        &self.utxos
    }

    /// Snapshot of the last commit for validation.
    pub fn view(&self) -> CommittedView<'_, S> {
        CommittedView::new(&self.utxos, self.store.as_ref())
    }

    /// Persist the buffered block and advance to it.
    ///
    /// All-or-nothing: if the store write fails, height, app hash and UTXO
    /// set are unchanged and the error is returned.
    pub fn commit_block(
        &mut self,
        pending: &PendingUtxo,
        timestamp: Timestamp,
    ) -> Result<Block, LedgerError> {
        let spent: Vec<_> = pending.spent_from_base().copied().collect();
        if let Some(missing) = spent.iter().find(|at| !self.utxos.contains(at)) {
            return Err(LedgerError::AlreadySpent(*missing));
        }

        let block = Block::next(
            self.height,
            &self.app_hash,
            pending.transaction_ids(),
            timestamp,
        );

        let mut commit = CommitSet::new(block.height, block.to_bytes()?);
        for validated in pending.transactions() {
            let stored = split_transaction(&validated.transaction);
            if let Some(asset) = stored.asset {
                commit.assets.push((stored.id, asset));
            }
            if let Some(metadata) = stored.metadata {
                commit.metadata.push((stored.id, metadata));
            }
            commit.transactions.push((stored.id, stored.record));
        }
        let created: Vec<_> = pending
            .created_unspent()
            .map(|(at, entry)| (*at, entry.clone()))
            .collect();
        for (at, entry) in &created {
            commit.utxo_created.push((*at, encode_entry(entry)?));
        }
        commit.utxo_spent = spent.clone();

        self.store.apply_commit(&commit)?;

        for at in &spent {
            self.utxos.spend(at)?;
        }
        for (at, entry) in created {
            self.utxos.add(at, entry);
        }
        self.height = block.height;
        self.app_hash = block.app_hash;
        Ok(block)
    }

    /// A committed transaction, reassembled with its asset and metadata.
    pub fn get_transaction(&self, id: &TxHash) -> Result<Option<Transaction>, LedgerError> {
        let Some(record) = optional(self.store.get_transaction(id))? else {
            return Ok(None);
        };
        let asset = optional(self.store.get_asset(id))?;
        let metadata = optional(self.store.get_metadata(id))?;
        assemble_transaction(&record, asset.as_deref(), metadata.as_deref()).map(Some)
    }

    /// Asset payload introduced by the CREATE with id `asset_id`.
    pub fn get_asset(&self, asset_id: &TxHash) -> Result<Option<Value>, LedgerError> {
        optional(self.store.get_asset(asset_id))?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(LedgerError::from))
            .transpose()
    }

    pub fn get_block(&self, height: u64) -> Result<Option<Block>, LedgerError> {
        optional(self.store.get_block(height))?
            .map(|bytes| Block::from_bytes(&bytes))
            .transpose()
    }

    pub fn latest_block(&self) -> Result<Option<Block>, LedgerError> {
        self.store
            .get_latest_block()?
            .map(|(_, bytes)| Block::from_bytes(&bytes))
            .transpose()
    }

    pub fn summary(&self) -> Result<LedgerSummary, LedgerError> {
        Ok(LedgerSummary {
            height: self.height,
            blocks: self.store.block_count()?,
            transactions: self.store.transaction_count()?,
            utxos: self.utxos.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_crypto::keypair_from_seed;
    use tessera_nullables::NullStore;
    use tessera_transactions::validate_transaction;

    fn commit_one(ledger: &mut Ledger<NullStore>, tx: &Transaction) -> Block {
        let mut pending = PendingUtxo::new();
        let validated = validate_transaction(tx, &pending.view(&ledger.view())).unwrap();
        pending.record(validated).unwrap();
        ledger.commit_block(&pending, Timestamp::new(1)).unwrap()
    }

    fn mint() -> Transaction {
        let alice = keypair_from_seed(&[1u8; 32]);
        let bob = keypair_from_seed(&[2u8; 32]);
        Transaction::create(
            &[alice.public],
            vec![(vec![bob.public], 1)],
            Some(json!({"name": "ticket"})),
            Some(json!({"issued": "today"})),
        )
        .sign(&[&alice])
        .unwrap()
    }

    #[test]
    fn commit_advances_height_and_utxos() {
        let mut ledger = Ledger::open(Arc::new(NullStore::new())).unwrap();
        let tx = mint();
        let block = commit_one(&mut ledger, &tx);

        assert_eq!(block.height, 1);
        assert_eq!(ledger.height(), 1);
        assert_eq!(ledger.app_hash(), block.app_hash);
        assert!(ledger.utxos().contains(&tx.output_ref(0)));
        assert_eq!(ledger.get_transaction(&tx.id).unwrap(), Some(tx.clone()));
        assert_eq!(ledger.get_asset(&tx.id).unwrap(), Some(json!({"name": "ticket"})));
    }

    #[test]
    fn reopen_recovers_committed_state() {
        let store = Arc::new(NullStore::new());
        let mut ledger = Ledger::open(store.clone()).unwrap();
        let tx = mint();
        let block = commit_one(&mut ledger, &tx);

        let reopened = Ledger::open(store).unwrap();
        assert_eq!(reopened.height(), 1);
        assert_eq!(reopened.app_hash(), block.app_hash);
        assert_eq!(reopened.utxos(), ledger.utxos());
        assert_eq!(reopened.latest_block().unwrap(), Some(block));
    }

    #[test]
    fn failed_store_write_changes_nothing() {
        let store = Arc::new(NullStore::new());
        let mut ledger = Ledger::open(store.clone()).unwrap();
        let tx = mint();

        let mut pending = PendingUtxo::new();
        pending
            .record(validate_transaction(&tx, &ledger.view()).unwrap())
            .unwrap();
        store.fail_next_commit();
        assert!(matches!(
            ledger.commit_block(&pending, Timestamp::new(1)),
            Err(LedgerError::Storage(_))
        ));

        assert_eq!(ledger.height(), 0);
        assert_eq!(ledger.app_hash(), GENESIS_APP_HASH);
        assert!(ledger.utxos().is_empty());
        assert_eq!(ledger.get_transaction(&tx.id).unwrap(), None);
    }

    #[test]
    fn transfer_stores_no_new_asset_payload() {
        let mut ledger = Ledger::open(Arc::new(NullStore::new())).unwrap();
        let create = mint();
        commit_one(&mut ledger, &create);

        let bob = keypair_from_seed(&[2u8; 32]);
        let transfer = Transaction::transfer(
            vec![(create.output_ref(0), vec![bob.public])],
            vec![(vec![bob.public], 1)],
            create.id,
            None,
        )
        .sign(&[&bob])
        .unwrap();
        commit_one(&mut ledger, &transfer);

        assert_eq!(ledger.get_asset(&transfer.id).unwrap(), None);
        assert!(!ledger.utxos().contains(&create.output_ref(0)));
        assert!(ledger.utxos().contains(&transfer.output_ref(0)));
        assert_eq!(ledger.summary().unwrap().transactions, 2);
    }
}
