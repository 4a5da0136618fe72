//! The consensus bridge: the node's side of the consensus engine's
//! application interface.
//!
//! The engine drives one state machine per node:
//!
//! ```text
//! Uninitialized --init_chain--> Ready --{check_tx*, begin_block, deliver_tx*}--> commit --> Ready
//! ```
//!
//! `check_tx` is advisory and only ever reads the last commit. `deliver_tx`
//! validates against the last commit plus the transactions already accepted
//! into the current block, so of two spends of one output the first
//! delivered wins. `commit` persists the buffered block atomically and only
//! then moves the committed height, app hash and UTXO set forward.
//!
//! Rejections are values ([`TxResult`]), never errors: the engine expects an
//! answer to every call. A store that cannot be read yields no verdict at
//! all: the transaction is answered `"StorageFailure"` and the block it was
//! delivered into can no longer be committed, so a replica with a sick disk
//! halts rather than diverges.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tessera_consensus::{
    BlockProposal, ConsensusError, ConsensusRules, TallyOutcome, Vote, VoteResult, VoteTally,
};
use tessera_ledger::{Ledger, LedgerError, PendingUtxo};
use tessera_store::LedgerStore;
use tessera_transactions::{decode_transaction, Transaction, ValidationError};
use tessera_types::{BlockHash, OutputRef, PublicKey, Timestamp, TxHash};

use crate::config::Genesis;
use crate::metrics::NodeMetrics;
use crate::tracing_spans::{
    check_tx_span, commit_span, cross_check_span, deliver_tx_span, query_span,
};
use crate::{AppState, NodeError};

/// Meta key holding the digest of the genesis document.
pub const GENESIS_KEY: &str = "genesis";

pub const QUERY_OK: u32 = 0;
pub const QUERY_NOT_FOUND: u32 = 1;
pub const QUERY_BAD_REQUEST: u32 = 2;
pub const QUERY_INTERNAL: u32 = 3;

/// Answer to `info`: the last durably committed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub last_height: u64,
    pub last_app_hash: BlockHash,
}

/// Header the engine passes to `begin_block`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub time: Timestamp,
}

/// Verdict on one `check_tx` or `deliver_tx` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub accepted: bool,
    /// Stable rejection tag, e.g. `"DoubleSpend"`. `None` when accepted.
    pub reason: Option<String>,
}

impl TxResult {
    pub fn ok() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

/// Answer to `query`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub code: u32,
    pub key: String,
    pub value: Value,
    pub log: String,
}

impl QueryResponse {
    fn found(key: &str, value: Value) -> Self {
        Self {
            code: QUERY_OK,
            key: key.to_string(),
            value,
            log: String::new(),
        }
    }

    fn failed(code: u32, key: &str, log: impl Into<String>) -> Self {
        Self {
            code,
            key: key.to_string(),
            value: Value::Null,
            log: log.into(),
        }
    }
}

/// This node's opinion of a block proposed elsewhere, next to what the
/// registered voters said about it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossCheck {
    pub block_id: BlockHash,
    pub valid: bool,
    /// Why this node finds the block invalid.
    pub reason: Option<String>,
    /// Votes counted toward the tally.
    pub counted: usize,
    pub outcome: TallyOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Ready,
    /// The engine is replaying a height this node already committed.
    Replaying { height: u64 },
}

/// State machine adapting the engine's lifecycle calls onto the ledger.
pub struct ConsensusBridge<S> {
    ledger: Ledger<S>,
    rules: Arc<dyn ConsensusRules>,
    metrics: Arc<NodeMetrics>,
    phase: Phase,
    pending: PendingUtxo,
    block_time: Option<Timestamp>,
    /// Set when a delivery in the current block could not read the store.
    storage_fault: Option<String>,
}

impl<S: LedgerStore> ConsensusBridge<S> {
    /// Open the bridge over the node's store, recovering the last committed
    /// height, app hash and UTXO set.
    pub fn open(state: &AppState<S>) -> Result<Self, NodeError> {
        let ledger = Ledger::open(Arc::clone(&state.store))?;
        let initialized = match state.store.get_meta(GENESIS_KEY) {
            Ok(_) => true,
            Err(e) if e.is_not_found() => ledger.height() > 0,
            Err(e) => return Err(e.into()),
        };

        state.metrics.height.set(ledger.height() as i64);
        state.metrics.utxo_count.set(ledger.utxos().len() as i64);
        tracing::info!(
            height = ledger.height(),
            rules = state.rules.name(),
            initialized,
            "consensus bridge opened"
        );

        Ok(Self {
            ledger,
            rules: Arc::clone(&state.rules),
            metrics: Arc::clone(&state.metrics),
            phase: if initialized {
                Phase::Ready
            } else {
                Phase::Uninitialized
            },
            pending: PendingUtxo::new(),
            block_time: None,
            storage_fault: None,
        })
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn is_initialized(&self) -> bool {
        self.phase != Phase::Uninitialized
    }

    /// Transactions accepted into the block being built.
    pub fn pending(&self) -> &PendingUtxo {
        &self.pending
    }

    /// Last durably committed height and app hash.
    pub fn info(&self) -> Info {
        Info {
            last_height: self.ledger.height(),
            last_app_hash: self.ledger.app_hash(),
        }
    }

    /// Bind this node to `genesis`. Calling again with the same document is
    /// a no-op; a different document fails with [`NodeError::GenesisMismatch`].
    pub fn init_chain(&mut self, genesis: &Genesis) -> Result<(), NodeError> {
        let digest = genesis.digest()?;
        let stored = self.ledger.store().get_meta(GENESIS_KEY);
        match stored {
            Ok(bytes) => {
                if bytes.as_slice() == digest.as_bytes() {
                    tracing::info!(chain_id = %genesis.chain_id, "genesis already applied");
                    self.phase = Phase::Ready;
                    return Ok(());
                }
                let stored = <[u8; 32]>::try_from(bytes.as_slice())
                    .map(BlockHash::new)
                    .unwrap_or(BlockHash::ZERO);
                return Err(NodeError::GenesisMismatch {
                    stored,
                    provided: digest,
                });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        if self.ledger.height() > 0 {
            return Err(NodeError::ChainInvalid {
                height: self.ledger.height(),
                reason: "store holds blocks but no genesis record".into(),
            });
        }

        self.ledger
            .store()
            .put_meta(GENESIS_KEY, digest.as_bytes())?;
        self.pending = PendingUtxo::new();
        self.storage_fault = None;
        self.phase = Phase::Ready;
        tracing::info!(chain_id = %genesis.chain_id, digest = %digest, "chain initialised");
        Ok(())
    }

    /// Start a block. Heights at or below the last commit put the bridge in
    /// replay mode until the next `commit`.
    pub fn begin_block(&mut self, header: BlockHeader) -> Result<(), NodeError> {
        if self.phase == Phase::Uninitialized {
            return Err(NodeError::NotInitialized);
        }
        let last = self.ledger.height();
        if !self.pending.is_empty() {
            tracing::warn!(
                discarded = self.pending.len(),
                "discarding transactions of an uncommitted block"
            );
            self.pending = PendingUtxo::new();
        }
        self.storage_fault = None;

        if header.height <= last {
            tracing::info!(height = header.height, last, "replaying committed height");
            self.phase = Phase::Replaying {
                height: header.height,
            };
            return Ok(());
        }
        if header.height != last + 1 {
            return Err(LedgerError::HeightGap {
                last,
                height: header.height,
            }
            .into());
        }

        self.phase = Phase::Ready;
        self.block_time = Some(header.time);
        Ok(())
    }

    /// Mempool admission check against the last commit only. Never mutates
    /// state.
    pub fn check_tx(&self, raw: &[u8]) -> TxResult {
        if self.phase == Phase::Uninitialized {
            return TxResult::rejected("NotInitialized");
        }
        let tx = match decode(raw) {
            Ok(tx) => tx,
            Err(e) => {
                tracing::debug!(error = %e, "check_tx: undecodable transaction");
                self.metrics.check_tx_rejected.inc();
                return TxResult::rejected(e.kind());
            }
        };

        let _span = check_tx_span(&tx.id.to_string()).entered();
        match self.rules.validate_transaction(&self.ledger.view(), &tx) {
            Ok(_) => {
                tracing::debug!("check_tx: valid");
                self.metrics.check_tx_accepted.inc();
                TxResult::ok()
            }
            Err(e) => {
                self.reject("check_tx", &tx.id, &e);
                self.metrics.check_tx_rejected.inc();
                TxResult::rejected(e.kind())
            }
        }
    }

    /// Validate `raw` against the block so far and buffer it on success.
    pub fn deliver_tx(&mut self, raw: &[u8]) -> TxResult {
        match self.phase {
            Phase::Uninitialized => return TxResult::rejected("NotInitialized"),
            Phase::Replaying { height } => {
                tracing::debug!(height, "deliver_tx during replay, nothing applied");
                return TxResult::ok();
            }
            Phase::Ready => {}
        }

        let tx = match decode(raw) {
            Ok(tx) => tx,
            Err(e) => {
                tracing::debug!(error = %e, "deliver_tx: undecodable transaction");
                self.metrics.deliver_tx_rejected.inc();
                return TxResult::rejected(e.kind());
            }
        };

        let height = self.ledger.height() + 1;
        let _span = deliver_tx_span(height, &tx.id.to_string()).entered();
        let validated = {
            let committed = self.ledger.view();
            let view = self.pending.view(&committed);
            self.rules.validate_transaction(&view, &tx)
        };
        let outcome = validated.and_then(|validated| {
            self.pending.record(validated).map_err(|e| match e {
                LedgerError::AlreadySpent(at) => ValidationError::DoubleSpend(at),
                _ => ValidationError::DuplicateTransaction(tx.id),
            })
        });

        match outcome {
            Ok(()) => {
                tracing::debug!(buffered = self.pending.len(), "deliver_tx: accepted");
                self.metrics.deliver_tx_accepted.inc();
                TxResult::ok()
            }
            Err(e) => {
                self.reject("deliver_tx", &tx.id, &e);
                self.metrics.deliver_tx_rejected.inc();
                if !e.is_verdict() {
                    self.storage_fault = Some(e.to_string());
                }
                TxResult::rejected(e.kind())
            }
        }
    }

    /// Persist the buffered block and return the new app hash.
    ///
    /// On failure nothing moves: height, app hash, UTXO set and the block
    /// buffer are as they were before the call. A block in which a delivery
    /// could not read the store is refused with
    /// [`NodeError::StorageFailure`] until the engine restarts it.
    pub fn commit(&mut self) -> Result<BlockHash, NodeError> {
        match self.phase {
            Phase::Uninitialized => return Err(NodeError::NotInitialized),
            Phase::Replaying { height } => {
                let block = self.ledger.get_block(height)?.ok_or_else(|| {
                    NodeError::ChainInvalid {
                        height,
                        reason: "replayed height has no stored block".into(),
                    }
                })?;
                self.phase = Phase::Ready;
                tracing::info!(height, app_hash = %block.app_hash, "replay commit, nothing written");
                return Ok(block.app_hash);
            }
            Phase::Ready => {}
        }

        let height = self.ledger.height() + 1;
        let _span = commit_span(height, self.pending.len()).entered();
        if let Some(reason) = &self.storage_fault {
            self.metrics.commit_failures.inc();
            tracing::error!(height, reason = %reason, "refusing to commit a block validated on unreadable state");
            return Err(NodeError::StorageFailure {
                height,
                reason: reason.clone(),
            });
        }
        let timestamp = self.block_time.unwrap_or_else(Timestamp::now);
        let started = Instant::now();

        let block = match self.ledger.commit_block(&self.pending, timestamp) {
            Ok(block) => block,
            Err(e) => {
                self.metrics.commit_failures.inc();
                tracing::error!(height, error = %e, "block commit failed, committed state unchanged");
                return Err(match e {
                    LedgerError::Storage(store) => NodeError::StorageFailure {
                        height,
                        reason: store.to_string(),
                    },
                    other => other.into(),
                });
            }
        };

        self.metrics
            .commit_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        self.metrics.commits.inc();
        self.metrics.height.set(block.height as i64);
        self.metrics.utxo_count.set(self.ledger.utxos().len() as i64);
        tracing::info!(
            height = block.height,
            transactions = block.transaction_ids.len(),
            app_hash = %block.app_hash,
            "block committed"
        );

        self.pending = PendingUtxo::new();
        self.block_time = None;
        Ok(block.app_hash)
    }

    /// Judge a block proposed for the next height against the last commit
    /// and tally the votes cast on it by `voters`. Nothing is written.
    pub fn cross_check(
        &self,
        proposal: &BlockProposal,
        voters: &[PublicKey],
        votes: &[Vote],
    ) -> Result<CrossCheck, NodeError> {
        if self.phase == Phase::Uninitialized {
            return Err(NodeError::NotInitialized);
        }
        let last = self.ledger.height();
        if proposal.height != last + 1 {
            return Err(LedgerError::HeightGap {
                last,
                height: proposal.height,
            }
            .into());
        }

        let block_id = proposal.id();
        let _span = cross_check_span(proposal.height, &block_id.to_string()).entered();
        let (valid, reason) = match self.rules.validate_block(&self.ledger.view(), proposal) {
            Ok(_) => (true, None),
            Err(ConsensusError::InvalidTransaction {
                source: ValidationError::Unavailable(e),
                ..
            }) => {
                return Err(NodeError::StorageFailure {
                    height: proposal.height,
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "proposed block is invalid");
                (false, Some(e.to_string()))
            }
        };

        let mut tally = VoteTally::new(self.rules.as_ref(), voters.to_vec(), block_id);
        for vote in votes {
            let result = tally.add_vote(vote);
            if result != VoteResult::Counted {
                tracing::debug!(voter = %vote.voter_public_key, ?result, "vote not counted");
            }
        }
        let outcome = tally.outcome();
        tracing::info!(valid, counted = tally.counted(), ?outcome, "block cross-checked");

        Ok(CrossCheck {
            block_id,
            valid,
            reason,
            counted: tally.counted(),
            outcome,
        })
    }

    /// Read-only lookups by path: `height`, `app_hash`, `tx/<id>`,
    /// `asset/<id>`, `utxo/<id>/<index>`, `block/<height>`.
    pub fn query(&self, path: &str) -> QueryResponse {
        let _span = query_span(path).entered();
        let mut parts = path.trim_matches('/').split('/');
        let result = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("height"), None, None, None) => Ok(Some(json!(self.ledger.height()))),
            (Some("app_hash"), None, None, None) => {
                Ok(Some(json!(self.ledger.app_hash().to_string())))
            }
            (Some("tx"), Some(id), None, None) => match parse::<TxHash>(id) {
                Ok(id) => self
                    .ledger
                    .get_transaction(&id)
                    .map(|tx| tx.map(|tx| tx.to_value())),
                Err(log) => return QueryResponse::failed(QUERY_BAD_REQUEST, path, log),
            },
            (Some("asset"), Some(id), None, None) => match parse::<TxHash>(id) {
                Ok(id) => self.ledger.get_asset(&id),
                Err(log) => return QueryResponse::failed(QUERY_BAD_REQUEST, path, log),
            },
            (Some("utxo"), Some(id), Some(index), None) => {
                match (parse::<TxHash>(id), parse::<u32>(index)) {
                    (Ok(id), Ok(index)) => {
                        let at = OutputRef::new(id, index);
                        Ok(self.ledger.utxos().get(&at).map(|entry| json!(entry)))
                    }
                    (Err(log), _) | (_, Err(log)) => {
                        return QueryResponse::failed(QUERY_BAD_REQUEST, path, log)
                    }
                }
            }
            (Some("block"), Some(height), None, None) => match parse::<u64>(height) {
                Ok(height) => self.ledger.get_block(height).map(|block| {
                    block.map(|block| {
                        let mut value = json!(block);
                        value["id"] = json!(block.id().to_string());
                        value
                    })
                }),
                Err(log) => return QueryResponse::failed(QUERY_BAD_REQUEST, path, log),
            },
            _ => return QueryResponse::failed(QUERY_BAD_REQUEST, path, "unknown query path"),
        };

        match result {
            Ok(Some(value)) => QueryResponse::found(path, value),
            Ok(None) => QueryResponse::failed(QUERY_NOT_FOUND, path, "not found"),
            Err(e) => {
                tracing::error!(path, error = %e, "query failed");
                QueryResponse::failed(QUERY_INTERNAL, path, e.to_string())
            }
        }
    }

    fn reject(&self, stage: &'static str, tx_id: &TxHash, error: &ValidationError) {
        match error {
            ValidationError::IdentityMismatch { .. } => {
                tracing::warn!(stage, tx = %tx_id, error = %error, "rejecting corrupt or malicious transaction");
            }
            ValidationError::DoubleSpend(output) => {
                self.metrics.double_spends.inc();
                tracing::warn!(stage, tx = %tx_id, output = %output, "double spend attempt rejected");
            }
            ValidationError::Unavailable(e) => {
                tracing::error!(stage, tx = %tx_id, error = %e, "no verdict, ledger state unreadable");
            }
            _ => {
                tracing::debug!(stage, tx = %tx_id, reason = error.kind(), error = %error, "transaction rejected");
            }
        }
    }
}

fn decode(raw: &[u8]) -> Result<Transaction, ValidationError> {
    Ok(decode_transaction(raw)?)
}

fn parse<T: FromStr>(s: &str) -> Result<T, String> {
    s.parse::<T>().map_err(|_| format!("cannot parse {s:?}"))
}

/// A bridge shared between the engine-facing tasks of one node.
pub type SharedBridge<S> = Arc<tokio::sync::Mutex<ConsensusBridge<S>>>;

/// Run [`ConsensusBridge::commit`] on the blocking pool and give up waiting
/// after `timeout`.
///
/// A commit that outlives the timeout still finishes or fails atomically on
/// its own; the caller only stops waiting for it.
pub async fn commit_within<S>(bridge: SharedBridge<S>, timeout: Duration) -> Result<BlockHash, NodeError>
where
    S: LedgerStore + 'static,
{
    let mut guard = bridge.lock_owned().await;
    let task = tokio::task::spawn_blocking(move || guard.commit());
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(NodeError::Other(format!("commit task failed: {join}"))),
        Err(_) => Err(NodeError::CommitTimeout {
            after_ms: timeout.as_millis() as u64,
        }),
    }
}
