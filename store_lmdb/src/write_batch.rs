//! Write batching: groups multiple store operations into a single LMDB write
//! transaction, so a block commit costs one fsync and lands atomically.
//!
//! # Usage
//!
//! ```ignore
//! let mut batch = env.write_batch()?;
//! batch.put_block(height, &block_bytes)?;
//! batch.delete_utxo(&spent)?;
//! batch.commit()?;
//! ```
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted).

use heed::RwTxn;

use tessera_store::{CommitSet, StoreError};
use tessera_types::{OutputRef, TxHash};

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

/// A write batch that groups multiple store operations into a single LMDB
/// write transaction.
pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
}

impl<'a> WriteBatch<'a> {
    /// Begin a new write batch.
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, StoreError> {
        let txn = env.env().write_txn().map_err(LmdbError::from)?;
        Ok(Self { txn, env })
    }

    // ── Block operations ────────────────────────────────────────────────

    pub fn put_block(&mut self, height: u64, block: &[u8]) -> Result<(), StoreError> {
        self.env
            .blocks_db
            .put(&mut self.txn, &height.to_be_bytes(), block)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    // ── Transaction, asset and metadata operations ─────────────────────

    pub fn put_transaction(&mut self, id: &TxHash, record: &[u8]) -> Result<(), StoreError> {
        self.env
            .transactions_db
            .put(&mut self.txn, id.as_bytes(), record)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    pub fn put_asset(&mut self, asset_id: &TxHash, data: &[u8]) -> Result<(), StoreError> {
        self.env
            .assets_db
            .put(&mut self.txn, asset_id.as_bytes(), data)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    pub fn put_metadata(&mut self, tx_id: &TxHash, metadata: &[u8]) -> Result<(), StoreError> {
        self.env
            .metadata_db
            .put(&mut self.txn, tx_id.as_bytes(), metadata)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    // ── UTXO operations ─────────────────────────────────────────────────

    pub fn put_utxo(&mut self, at: &OutputRef, entry: &[u8]) -> Result<(), StoreError> {
        self.env
            .utxos_db
            .put(&mut self.txn, &at.to_key(), entry)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    /// Remove an unspent output. Removing an absent output is an error: the
    /// caller validated the spend, so absence means the store diverged.
    pub fn delete_utxo(&mut self, at: &OutputRef) -> Result<(), StoreError> {
        let removed = self
            .env
            .utxos_db
            .delete(&mut self.txn, &at.to_key())
            .map_err(LmdbError::from)?;
        if !removed {
            return Err(StoreError::Corruption(format!(
                "spent output {at} is not in the unspent set"
            )));
        }
        Ok(())
    }

    // ── Meta operations ─────────────────────────────────────────────────

    pub fn put_meta(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.env
            .meta_db
            .put(&mut self.txn, key.as_bytes(), value)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    pub fn delete_meta(&mut self, key: &str) -> Result<(), StoreError> {
        self.env
            .meta_db
            .delete(&mut self.txn, key.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    /// Stage every write of a block commit.
    pub fn apply(&mut self, commit: &CommitSet) -> Result<(), StoreError> {
        for (id, record) in &commit.transactions {
            self.put_transaction(id, record)?;
        }
        for (asset_id, data) in &commit.assets {
            self.put_asset(asset_id, data)?;
        }
        for (tx_id, metadata) in &commit.metadata {
            self.put_metadata(tx_id, metadata)?;
        }
        for (at, entry) in &commit.utxo_created {
            self.put_utxo(at, entry)?;
        }
        for at in &commit.utxo_spent {
            self.delete_utxo(at)?;
        }
        for (key, value) in &commit.meta {
            self.put_meta(key, value)?;
        }
        self.put_block(commit.height, &commit.block)
    }

    // ── Commit / rollback ───────────────────────────────────────────────

    /// Commit all batched operations in a single write transaction.
    ///
    /// This is the only fsync in the entire batch.
    pub fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;
    use tessera_store::{BlockStore, LedgerStore, TransactionStore, UtxoStore};

    /// Helper: open a temporary LMDB environment.
    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let env = LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).expect("failed to open env");
        (dir, env)
    }

    #[test]
    fn batch_put_block_and_transaction_committed() {
        let (_dir, env) = temp_env();

        let id = TxHash::new([1u8; 32]);
        let mut batch = env.write_batch().expect("write_batch");
        batch.put_block(1, b"block-1").expect("put_block");
        batch.put_transaction(&id, b"tx-record").expect("put_transaction");
        batch.commit().expect("commit");

        assert_eq!(env.get_block(1).expect("get_block"), b"block-1");
        assert_eq!(env.get_transaction(&id).expect("get_transaction"), b"tx-record");
    }

    #[test]
    fn dropped_batch_does_not_persist() {
        let (_dir, env) = temp_env();

        {
            let mut batch = env.write_batch().expect("write_batch");
            batch.put_block(7, b"should-not-persist").expect("put_block");
            // batch is dropped here, implicit rollback
        }

        assert!(env.get_block(7).unwrap_err().is_not_found());
    }

    #[test]
    fn apply_commit_moves_utxos() {
        let (_dir, env) = temp_env();
        let old = OutputRef::new(TxHash::new([1u8; 32]), 0);
        env.put_utxo(&old, b"old").expect("put_utxo");

        let new = OutputRef::new(TxHash::new([2u8; 32]), 0);
        let mut commit = CommitSet::new(1, b"block-1".to_vec());
        commit.transactions.push((new.transaction_id, b"tx".to_vec()));
        commit.utxo_spent.push(old);
        commit.utxo_created.push((new, b"new".to_vec()));
        env.apply_commit(&commit).expect("apply_commit");

        let utxos = env.iter_utxos().expect("iter_utxos");
        assert_eq!(utxos, vec![(new, b"new".to_vec())]);
        assert_eq!(env.get_latest_block().expect("latest").map(|(h, _)| h), Some(1));
    }

    #[test]
    fn failed_commit_leaves_nothing_behind() {
        let (_dir, env) = temp_env();
        let missing = OutputRef::new(TxHash::new([9u8; 32]), 3);

        let mut commit = CommitSet::new(1, b"block-1".to_vec());
        commit.transactions.push((TxHash::new([5u8; 32]), b"tx".to_vec()));
        commit.utxo_spent.push(missing);
        let err = env.apply_commit(&commit).unwrap_err();
        assert!(matches!(err, StoreError::Corruption(_)));

        assert!(!env.exists(&TxHash::new([5u8; 32])).expect("exists"));
        assert_eq!(env.get_latest_block().expect("latest"), None);
    }

    #[test]
    fn output_created_and_spent_in_one_commit_is_absent() {
        let (_dir, env) = temp_env();
        let at = OutputRef::new(TxHash::new([3u8; 32]), 0);

        let mut commit = CommitSet::new(1, Vec::new());
        commit.utxo_created.push((at, b"short-lived".to_vec()));
        commit.utxo_spent.push(at);
        env.apply_commit(&commit).expect("apply_commit");

        assert_eq!(env.utxo_count().expect("count"), 0);
    }
}
