//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use tessera_store::{CommitSet, LedgerStore, StoreError};

use crate::migration::Migrator;
use crate::write_batch::WriteBatch;
use crate::LmdbError;

pub(crate) const TRANSACTIONS_DB: &str = "transactions";
pub(crate) const ASSETS_DB: &str = "assets";
pub(crate) const METADATA_DB: &str = "metadata";
pub(crate) const BLOCKS_DB: &str = "blocks";
pub(crate) const UTXOS_DB: &str = "utxos";
pub(crate) const META_DB: &str = "meta";

/// Number of named databases the ledger uses.
pub const DATABASE_COUNT: u32 = 6;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Env,
    pub(crate) transactions_db: Database<Bytes, Bytes>,
    pub(crate) assets_db: Database<Bytes, Bytes>,
    pub(crate) metadata_db: Database<Bytes, Bytes>,
    /// Keyed by big-endian height so the last entry is the latest block.
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    /// Keyed by [`tessera_types::OutputRef::to_key`].
    pub(crate) utxos_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path, then bring the
    /// schema up to date.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        let mut options = EnvOpenOptions::new();
        options.map_size(map_size).max_dbs(DATABASE_COUNT);
        // SAFETY: the environment is opened once per path by this process and
        // the memory map is never modified outside of LMDB.
        let env = unsafe { options.open(path) }?;

        let mut wtxn = env.write_txn()?;
        let transactions_db = env.create_database(&mut wtxn, Some(TRANSACTIONS_DB))?;
        let assets_db = env.create_database(&mut wtxn, Some(ASSETS_DB))?;
        let metadata_db = env.create_database(&mut wtxn, Some(METADATA_DB))?;
        let blocks_db = env.create_database(&mut wtxn, Some(BLOCKS_DB))?;
        let utxos_db = env.create_database(&mut wtxn, Some(UTXOS_DB))?;
        let meta_db = env.create_database(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        let environment = Self {
            env,
            transactions_db,
            assets_db,
            metadata_db,
            blocks_db,
            utxos_db,
            meta_db,
        };
        Migrator::run(&environment)?;

        tracing::info!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(environment)
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Begin a write batch. Dropping it without committing rolls back.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, StoreError> {
        WriteBatch::new(self)
    }

    pub(crate) fn read(
        &self,
        db: &Database<Bytes, Bytes>,
        key: &[u8],
        what: impl FnOnce() -> String,
    ) -> Result<Vec<u8>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let value = db
            .get(&rtxn, key)
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(what()))?;
        Ok(value.to_vec())
    }

    pub(crate) fn contains(
        &self,
        db: &Database<Bytes, Bytes>,
        key: &[u8],
    ) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(db.get(&rtxn, key).map_err(LmdbError::from)?.is_some())
    }

    pub(crate) fn count(&self, db: &Database<Bytes, Bytes>) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(db.len(&rtxn).map_err(LmdbError::from)?)
    }

    /// Single-operation write, committed immediately.
    pub(crate) fn write(
        &self,
        op: impl FnOnce(&mut WriteBatch<'_>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        op(&mut batch)?;
        batch.commit()
    }
}

impl LedgerStore for LmdbEnvironment {
    fn apply_commit(&self, commit: &CommitSet) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        batch.apply(commit)?;
        batch.commit()?;
        tracing::debug!(
            height = commit.height,
            transactions = commit.transactions.len(),
            "block committed to LMDB"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_store::{BlockStore, MetaStore};

    #[test]
    fn reopen_preserves_data() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        {
            let env = LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).expect("open");
            env.put_block(1, b"first").expect("put_block");
        }
        let env = LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).expect("reopen");
        assert_eq!(env.get_block(1).expect("get_block"), b"first");
        assert_eq!(
            env.get_schema_version().expect("schema"),
            crate::CURRENT_SCHEMA_VERSION
        );
    }
}
