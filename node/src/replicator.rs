//! Legacy peer replication.
//!
//! Before the consensus engine drove block production, nodes copied
//! candidate transactions from each other's change logs. Each peer's log is a
//! [`ChangeFeed`]; one listener task per peer hands every document it reads
//! to [`Replicator::validate_and_write_transaction`], which inserts the
//! transaction into the node's backlog if it is valid and not already there.
//!
//! Peers are isolated from each other and from block production: a feed
//! that errors is logged and retried with back-off, never awaited by anyone
//! else.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tessera_broadcast::{BroadcastClient, RpcTransport, WriteMode};
use tessera_consensus::ConsensusRules;
use tessera_ledger::StoreView;
use tessera_store::LedgerStore;
use tessera_transactions::{Transaction, ValidationError};
use tessera_types::TxHash;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::metrics::NodeMetrics;
use crate::tracing_spans::replication_span;
use crate::{AppState, NodeError, ShutdownController};

/// Storage bookkeeping fields a peer's log adds to each transaction.
const BOOKKEEPING_KEYS: [&str; 3] = ["_id", "assignee", "assignment_timestamp"];

/// Maximum transactions held in the backlog.
const DEFAULT_BACKLOG_CAPACITY: usize = 10_000;

/// Ceiling of the per-peer retry back-off.
const MAX_RETRY: Duration = Duration::from_secs(60);

/// What [`Replicator::validate_and_write_transaction`] did with a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(TxHash),
    /// Already in the backlog or already committed.
    AlreadyPresent(TxHash),
    Rejected(String),
}

/// Transactions waiting to be forwarded to the consensus engine, in arrival
/// order.
struct Backlog {
    order: VecDeque<TxHash>,
    transactions: HashMap<TxHash, Transaction>,
    capacity: usize,
}

impl Backlog {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            transactions: HashMap::new(),
            capacity,
        }
    }
}

pub struct Replicator<S> {
    store: Arc<S>,
    rules: Arc<dyn ConsensusRules>,
    metrics: Arc<NodeMetrics>,
    backlog: Mutex<Backlog>,
}

impl<S: LedgerStore> Replicator<S> {
    pub fn new(state: &AppState<S>) -> Self {
        Self::with_capacity(state, DEFAULT_BACKLOG_CAPACITY)
    }

    pub fn with_capacity(state: &AppState<S>, capacity: usize) -> Self {
        Self {
            store: Arc::clone(&state.store),
            rules: Arc::clone(&state.rules),
            metrics: Arc::clone(&state.metrics),
            backlog: Mutex::new(Backlog::new(capacity)),
        }
    }

    /// Insert `doc` into the backlog if it is a valid transaction that is
    /// neither backlogged nor committed yet. Safe to call any number of times
    /// with the same document.
    pub fn validate_and_write_transaction(&self, mut doc: Value) -> WriteOutcome {
        if let Some(fields) = doc.as_object_mut() {
            for key in BOOKKEEPING_KEYS {
                fields.remove(key);
            }
        }

        let tx: Transaction = match serde_json::from_value(doc) {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(error = %e, "invalid transaction schema");
                return WriteOutcome::Rejected("SchemaError".into());
            }
        };

        if self.lock_backlog().transactions.contains_key(&tx.id) {
            return WriteOutcome::AlreadyPresent(tx.id);
        }

        match self
            .rules
            .validate_transaction(&StoreView::new(self.store.as_ref()), &tx)
        {
            Ok(_) => {}
            Err(ValidationError::DuplicateTransaction(id)) => {
                return WriteOutcome::AlreadyPresent(id);
            }
            Err(ValidationError::DoubleSpend(output)) => {
                self.metrics.double_spends.inc();
                tracing::warn!(tx = %tx.id, output = %output, "DOUBLE SPEND from peer");
                return WriteOutcome::Rejected("DoubleSpend".into());
            }
            Err(ValidationError::Unavailable(e)) => {
                tracing::error!(tx = %tx.id, error = %e, "cannot validate peer transaction, store unreadable");
                return WriteOutcome::Rejected("StorageFailure".into());
            }
            Err(e) => {
                tracing::warn!(tx = %tx.id, reason = e.kind(), error = %e, "invalid transaction from peer");
                return WriteOutcome::Rejected(e.kind().into());
            }
        }

        let mut backlog = self.lock_backlog();
        // Another listener may have written it while we validated.
        if backlog.transactions.contains_key(&tx.id) {
            return WriteOutcome::AlreadyPresent(tx.id);
        }
        if backlog.transactions.len() >= backlog.capacity {
            tracing::warn!(tx = %tx.id, capacity = backlog.capacity, "backlog full, dropping transaction");
            return WriteOutcome::Rejected("BacklogFull".into());
        }
        let id = tx.id;
        backlog.order.push_back(id);
        backlog.transactions.insert(id, tx);
        self.metrics.replicated.inc();
        tracing::debug!(tx = %id, "transaction written to backlog");
        WriteOutcome::Written(id)
    }

    pub fn backlog_len(&self) -> usize {
        self.lock_backlog().transactions.len()
    }

    /// Remove and return every backlogged transaction, oldest first.
    pub fn take_backlog(&self) -> Vec<Transaction> {
        let mut backlog = self.lock_backlog();
        let order = std::mem::take(&mut backlog.order);
        let mut transactions = std::mem::take(&mut backlog.transactions);
        order
            .into_iter()
            .filter_map(|id| transactions.remove(&id))
            .collect()
    }

    fn lock_backlog(&self) -> std::sync::MutexGuard<'_, Backlog> {
        // A panic while holding the lock cannot leave the backlog half
        // updated, so a poisoned lock is still usable.
        self.backlog
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Submit the whole backlog to the consensus engine, oldest first, without
/// waiting for the mempool check. Returns how many submissions went through.
///
/// A transaction the engine refuses is dropped; the engine's own check
/// decides whether it ever reaches a block.
pub async fn forward_backlog<S, T>(replicator: &Replicator<S>, client: &BroadcastClient<T>) -> usize
where
    S: LedgerStore,
    T: RpcTransport,
{
    let mut forwarded = 0;
    for tx in replicator.take_backlog() {
        match client.submit(&tx, WriteMode::Async).await {
            Ok(_) => forwarded += 1,
            Err(e) => {
                tracing::warn!(tx = %tx.id, error = %e, "forwarding replicated transaction failed")
            }
        }
    }
    forwarded
}

/// A peer's stream of candidate transaction documents.
pub trait ChangeFeed: Send {
    /// Peer name for logs.
    fn peer(&self) -> &str;

    /// Documents appended since the previous call. Empty when nothing new
    /// arrived.
    fn next_batch(&mut self) -> impl Future<Output = Result<Vec<Value>, NodeError>> + Send;
}

/// A peer change log exported as newline-delimited JSON, read incrementally.
pub struct FileFeed {
    path: PathBuf,
    name: String,
    /// Bytes of the log already consumed.
    offset: u64,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self {
            path,
            name,
            offset: 0,
        }
    }
}

impl ChangeFeed for FileFeed {
    fn peer(&self) -> &str {
        &self.name
    }

    async fn next_batch(&mut self) -> Result<Vec<Value>, NodeError> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();
        if len < self.offset {
            tracing::warn!(peer = %self.name, "change log shrank, reading from the start");
            self.offset = 0;
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut fresh = Vec::new();
        file.read_to_end(&mut fresh).await?;
        // Only complete lines; a partially written last line waits.
        let Some(end) = fresh.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };

        let mut docs = Vec::new();
        for line in fresh[..end].split(|b| *b == b'\n') {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice(line) {
                Ok(doc) => docs.push(doc),
                Err(e) => tracing::warn!(peer = %self.name, error = %e, "skipping malformed change log line"),
            }
        }
        self.offset += end as u64 + 1;
        Ok(docs)
    }
}

/// Start one listener task per feed. Each polls its feed every `poll`, and
/// after a failure waits `retry`, doubling up to one minute while the feed
/// keeps failing.
pub fn spawn_peer_listeners<S, F>(
    feeds: Vec<F>,
    replicator: Arc<Replicator<S>>,
    shutdown: &ShutdownController,
    poll: Duration,
    retry: Duration,
) -> Vec<JoinHandle<()>>
where
    S: LedgerStore + 'static,
    F: ChangeFeed + 'static,
{
    feeds
        .into_iter()
        .map(|mut feed| {
            let replicator = Arc::clone(&replicator);
            let mut shutdown_rx = shutdown.subscribe();
            let span = replication_span(feed.peer());
            tokio::spawn(
                async move {
                    let mut backoff = retry;
                    loop {
                        let delay = match feed.next_batch().await {
                            Ok(docs) => {
                                backoff = retry;
                                for doc in docs {
                                    replicator.validate_and_write_transaction(doc);
                                }
                                poll
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, retry_in = ?backoff, "peer feed failed");
                                let delay = backoff;
                                backoff = (backoff * 2).min(MAX_RETRY);
                                delay
                            }
                        };
                        tokio::select! {
                            biased;
                            _ = shutdown_rx.recv() => {
                                tracing::info!("peer listener shutting down");
                                break;
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
                .instrument(span),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeConfig;
    use serde_json::json;
    use std::io::Write;
    use tessera_crypto::keypair_from_seed;
    use tessera_nullables::{NullStore, NullTransport};

    fn state() -> AppState<NullStore> {
        AppState::new(NodeConfig::default(), Arc::new(NullStore::new())).unwrap()
    }

    fn mint(seed: u8) -> Transaction {
        let creator = keypair_from_seed(&[seed; 32]);
        Transaction::create(&[creator.public], vec![(vec![creator.public], 5)], None, None)
            .sign(&[&creator])
            .unwrap()
    }

    #[test]
    fn bookkeeping_fields_are_stripped_and_writes_are_idempotent() {
        let replicator = Replicator::new(&state());
        let tx = mint(1);
        let mut doc = tx.to_value();
        doc["_id"] = json!("5a1f");
        doc["assignee"] = json!("node-b");
        doc["assignment_timestamp"] = json!(1_500_000_000);

        assert_eq!(
            replicator.validate_and_write_transaction(doc.clone()),
            WriteOutcome::Written(tx.id)
        );
        assert_eq!(
            replicator.validate_and_write_transaction(doc),
            WriteOutcome::AlreadyPresent(tx.id)
        );
        assert_eq!(replicator.backlog_len(), 1);
    }

    #[test]
    fn invalid_documents_are_rejected() {
        let replicator = Replicator::new(&state());
        assert_eq!(
            replicator.validate_and_write_transaction(json!({"hello": "world"})),
            WriteOutcome::Rejected("SchemaError".into())
        );

        let mut forged = mint(1).to_value();
        forged["metadata"] = json!({"changed": true});
        assert_eq!(
            replicator.validate_and_write_transaction(forged),
            WriteOutcome::Rejected("IdentityMismatch".into())
        );
        assert_eq!(replicator.backlog_len(), 0);
    }

    #[test]
    fn unreadable_store_writes_nothing() {
        let state = state();
        let replicator = Replicator::new(&state);
        state.store.fail_reads(true);

        let tx = mint(7);
        assert_eq!(
            replicator.validate_and_write_transaction(tx.to_value()),
            WriteOutcome::Rejected("StorageFailure".into())
        );
        assert_eq!(replicator.backlog_len(), 0);

        state.store.fail_reads(false);
        assert_eq!(
            replicator.validate_and_write_transaction(tx.to_value()),
            WriteOutcome::Written(tx.id)
        );
    }

    #[test]
    fn full_backlog_refuses_new_transactions() {
        let replicator = Replicator::with_capacity(&state(), 1);
        assert!(matches!(
            replicator.validate_and_write_transaction(mint(1).to_value()),
            WriteOutcome::Written(_)
        ));
        assert_eq!(
            replicator.validate_and_write_transaction(mint(2).to_value()),
            WriteOutcome::Rejected("BacklogFull".into())
        );
    }

    #[test]
    fn take_backlog_keeps_arrival_order() {
        let replicator = Replicator::new(&state());
        let ids: Vec<_> = (1..=3)
            .map(|seed| {
                let tx = mint(seed);
                replicator.validate_and_write_transaction(tx.to_value());
                tx.id
            })
            .collect();
        let taken: Vec<_> = replicator.take_backlog().iter().map(|tx| tx.id).collect();
        assert_eq!(taken, ids);
        assert_eq!(replicator.backlog_len(), 0);
    }

    #[tokio::test]
    async fn file_feed_reads_only_complete_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peer.ndjson");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", json!({"n": 1})).unwrap();
        write!(file, "{{\"n\": 2").unwrap();
        file.flush().unwrap();

        let mut feed = FileFeed::new(&path);
        assert_eq!(feed.next_batch().await.unwrap(), vec![json!({"n": 1})]);
        assert!(feed.next_batch().await.unwrap().is_empty());

        writeln!(file, "}}").unwrap();
        writeln!(file, "not json").unwrap();
        file.flush().unwrap();
        assert_eq!(feed.next_batch().await.unwrap(), vec![json!({"n": 2})]);
    }

    #[tokio::test]
    async fn file_feed_resumes_at_its_offset_and_restarts_on_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peer.ndjson");
        let first = format!("{}\n", json!({"n": 1}));
        std::fs::write(&path, &first).unwrap();

        let mut feed = FileFeed::new(&path);
        assert_eq!(feed.next_batch().await.unwrap(), vec![json!({"n": 1})]);
        assert_eq!(feed.offset, first.len() as u64);
        assert!(feed.next_batch().await.unwrap().is_empty());

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{}", json!({"n": 2})).unwrap();
        file.flush().unwrap();
        assert_eq!(feed.next_batch().await.unwrap(), vec![json!({"n": 2})]);

        std::fs::write(&path, "{\"n\":3}\n").unwrap();
        assert_eq!(feed.next_batch().await.unwrap(), vec![json!({"n": 3})]);
        assert_eq!(feed.offset, 8);
    }

    #[tokio::test]
    async fn backlog_is_forwarded_oldest_first() {
        let replicator = Replicator::new(&state());
        let (first, second) = (mint(5), mint(6));
        replicator.validate_and_write_transaction(first.to_value());
        replicator.validate_and_write_transaction(second.to_value());

        let client = BroadcastClient::new(NullTransport::new());
        client.transport().enqueue_failure("engine down");
        assert_eq!(forward_backlog(&replicator, &client).await, 1);
        assert_eq!(replicator.backlog_len(), 0);

        let requests = client.transport().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["method"], "broadcast_tx_async");
        assert_eq!(
            requests[1]["params"][0],
            json!(tessera_transactions::encode_transaction(&second))
        );
    }

    #[tokio::test]
    async fn failing_peer_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.ndjson");
        let tx = mint(4);
        std::fs::write(&good, format!("{}\n", tx.to_value())).unwrap();

        let replicator = Arc::new(Replicator::new(&state()));
        let shutdown = ShutdownController::new();
        let feeds = vec![
            FileFeed::new(dir.path().join("missing.ndjson")),
            FileFeed::new(&good),
        ];
        let handles = spawn_peer_listeners(
            feeds,
            Arc::clone(&replicator),
            &shutdown,
            Duration::from_millis(10),
            Duration::from_millis(10),
        );

        for _ in 0..100 {
            if replicator.backlog_len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(replicator.backlog_len(), 1);

        shutdown.shutdown();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
