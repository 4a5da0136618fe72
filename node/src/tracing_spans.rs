//! Pre-built [`tracing::Span`] constructors for the node's entry points.
//!
//! Consistent span names and field sets make the bridge's lifecycle calls
//! easy to filter and correlate.

use tracing::{debug_span, info_span, Span};

/// Span covering one mempool admission check.
pub fn check_tx_span(tx_id: &str) -> Span {
    debug_span!("check_tx", tx = %tx_id)
}

/// Span covering one transaction delivered into a block.
pub fn deliver_tx_span(height: u64, tx_id: &str) -> Span {
    debug_span!("deliver_tx", height, tx = %tx_id)
}

/// Span covering a block commit.
pub fn commit_span(height: u64, transactions: usize) -> Span {
    info_span!("commit", height, transactions)
}

/// Span covering a read-only query.
pub fn query_span(path: &str) -> Span {
    debug_span!("query", path = %path)
}

/// Span covering one legacy replication peer's listener.
pub fn replication_span(peer: &str) -> Span {
    info_span!("replication", peer = %peer)
}

/// Span covering the replay of one stored block.
pub fn verify_block_span(height: u64) -> Span {
    debug_span!("verify_block", height)
}

/// Span covering the cross-check of a block proposed elsewhere.
pub fn cross_check_span(height: u64, block_id: &str) -> Span {
    info_span!("cross_check", height, block = %block_id)
}
