//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tessera_store::{
    AssetStore, BlockStore, CommitSet, LedgerStore, MetaStore, MetadataStore, StoreError,
    TransactionStore, UtxoStore,
};
use tessera_types::{OutputRef, TxHash};

const SCHEMA_VERSION_KEY: &str = "schema_version";

#[derive(Clone, Default)]
struct Tables {
    transactions: HashMap<TxHash, Vec<u8>>,
    assets: HashMap<TxHash, Vec<u8>>,
    metadata: HashMap<TxHash, Vec<u8>>,
    blocks: BTreeMap<u64, Vec<u8>>,
    utxos: BTreeMap<OutputRef, Vec<u8>>,
    meta: HashMap<String, Vec<u8>>,
}

/// An in-memory ledger store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullStore {
    tables: Mutex<Tables>,
    fail_next_commit: AtomicBool,
    fail_reads: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            fail_next_commit: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// While set, lookups of transactions, assets and outputs fail with a
    /// backend error instead of answering.
    pub fn fail_reads(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }

    fn check_read(&self, what: &str) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("injected read failure ({what})")));
        }
        Ok(())
    }

    /// Make the next [`LedgerStore::apply_commit`] fail with a backend error
    /// without writing anything.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of commits applied so far.
    pub fn commit_count(&self) -> usize {
        self.tables.lock().unwrap().blocks.len()
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(what: impl std::fmt::Display) -> StoreError {
    StoreError::NotFound(what.to_string())
}

impl TransactionStore for NullStore {
    fn put_transaction(&self, id: &TxHash, record: &[u8]) -> Result<(), StoreError> {
        self.tables
            .lock()
            .unwrap()
            .transactions
            .insert(*id, record.to_vec());
        Ok(())
    }

    fn get_transaction(&self, id: &TxHash) -> Result<Vec<u8>, StoreError> {
        self.check_read("transaction")?;
        self.tables
            .lock()
            .unwrap()
            .transactions
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(format!("transaction {id}")))
    }

    fn exists(&self, id: &TxHash) -> Result<bool, StoreError> {
        self.check_read("transaction")?;
        Ok(self.tables.lock().unwrap().transactions.contains_key(id))
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().transactions.len() as u64)
    }
}

impl AssetStore for NullStore {
    fn put_asset(&self, asset_id: &TxHash, data: &[u8]) -> Result<(), StoreError> {
        self.tables
            .lock()
            .unwrap()
            .assets
            .insert(*asset_id, data.to_vec());
        Ok(())
    }

    fn get_asset(&self, asset_id: &TxHash) -> Result<Vec<u8>, StoreError> {
        self.check_read("asset")?;
        self.tables
            .lock()
            .unwrap()
            .assets
            .get(asset_id)
            .cloned()
            .ok_or_else(|| not_found(format!("asset {asset_id}")))
    }

    fn asset_exists(&self, asset_id: &TxHash) -> Result<bool, StoreError> {
        self.check_read("asset")?;
        Ok(self.tables.lock().unwrap().assets.contains_key(asset_id))
    }
}

impl MetadataStore for NullStore {
    fn put_metadata(&self, tx_id: &TxHash, metadata: &[u8]) -> Result<(), StoreError> {
        self.tables
            .lock()
            .unwrap()
            .metadata
            .insert(*tx_id, metadata.to_vec());
        Ok(())
    }

    fn get_metadata(&self, tx_id: &TxHash) -> Result<Vec<u8>, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .metadata
            .get(tx_id)
            .cloned()
            .ok_or_else(|| not_found(format!("metadata of {tx_id}")))
    }
}

impl BlockStore for NullStore {
    fn put_block(&self, height: u64, block: &[u8]) -> Result<(), StoreError> {
        self.tables
            .lock()
            .unwrap()
            .blocks
            .insert(height, block.to_vec());
        Ok(())
    }

    fn get_block(&self, height: u64) -> Result<Vec<u8>, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| not_found(format!("block at height {height}")))
    }

    fn get_latest_block(&self) -> Result<Option<(u64, Vec<u8>)>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .blocks
            .last_key_value()
            .map(|(h, b)| (*h, b.clone())))
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().blocks.len() as u64)
    }
}

impl UtxoStore for NullStore {
    fn put_utxo(&self, at: &OutputRef, entry: &[u8]) -> Result<(), StoreError> {
        self.tables
            .lock()
            .unwrap()
            .utxos
            .insert(*at, entry.to_vec());
        Ok(())
    }

    fn delete_utxo(&self, at: &OutputRef) -> Result<(), StoreError> {
        self.tables
            .lock()
            .unwrap()
            .utxos
            .remove(at)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("output {at}")))
    }

    fn get_utxo(&self, at: &OutputRef) -> Result<Vec<u8>, StoreError> {
        self.check_read("utxo")?;
        self.tables
            .lock()
            .unwrap()
            .utxos
            .get(at)
            .cloned()
            .ok_or_else(|| not_found(format!("output {at}")))
    }

    fn iter_utxos(&self) -> Result<Vec<(OutputRef, Vec<u8>)>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .utxos
            .iter()
            .map(|(at, e)| (*at, e.clone()))
            .collect())
    }

    fn utxo_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().utxos.len() as u64)
    }
}

impl MetaStore for NullStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.tables
            .lock()
            .unwrap()
            .meta
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .meta
            .get(key)
            .cloned()
            .ok_or_else(|| not_found(format!("meta key '{key}'")))
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.tables.lock().unwrap().meta.remove(key);
        Ok(())
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        match self.get_meta(SCHEMA_VERSION_KEY) {
            Ok(bytes) => {
                let arr: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Serialization("schema_version has unexpected byte length".into())
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            Err(_) => Ok(0),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.put_meta(SCHEMA_VERSION_KEY, &version.to_le_bytes())
    }
}

impl LedgerStore for NullStore {
    fn apply_commit(&self, commit: &CommitSet) -> Result<(), StoreError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }

        let mut tables = self.tables.lock().unwrap();
        // Stage on a copy so a failure part-way leaves nothing behind.
        let mut staged = tables.clone();
        for (id, record) in &commit.transactions {
            staged.transactions.insert(*id, record.clone());
        }
        for (asset_id, data) in &commit.assets {
            staged.assets.insert(*asset_id, data.clone());
        }
        for (tx_id, metadata) in &commit.metadata {
            staged.metadata.insert(*tx_id, metadata.clone());
        }
        for (at, entry) in &commit.utxo_created {
            staged.utxos.insert(*at, entry.clone());
        }
        for at in &commit.utxo_spent {
            if staged.utxos.remove(at).is_none() {
                return Err(StoreError::Corruption(format!(
                    "spent output {at} is not in the unspent set"
                )));
            }
        }
        for (key, value) in &commit.meta {
            staged.meta.insert(key.clone(), value.clone());
        }
        staged.blocks.insert(commit.height, commit.block.clone());

        *tables = staged;
        Ok(())
    }
}
