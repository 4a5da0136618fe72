//! Prometheus metrics for the tessera node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]; callers that expose metrics
//! encode it with [`NodeMetrics::encode_text`].

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::NodeError;

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub check_tx_accepted: IntCounter,
    pub check_tx_rejected: IntCounter,
    pub deliver_tx_accepted: IntCounter,
    pub deliver_tx_rejected: IntCounter,
    /// Double spends seen by any entry point.
    pub double_spends: IntCounter,
    pub commits: IntCounter,
    pub commit_failures: IntCounter,
    /// Transactions written to the backlog by legacy replication.
    pub replicated: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub height: IntGauge,
    pub utxo_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent persisting one block, in milliseconds.
    pub commit_time_ms: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    register_int_counter_with_registry!(Opts::new(name, help), registry)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    register_int_gauge_with_registry!(Opts::new(name, help), registry)
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let check_tx_accepted = counter(
            &registry,
            "tessera_check_tx_accepted_total",
            "Transactions admitted by check_tx",
        )?;
        let check_tx_rejected = counter(
            &registry,
            "tessera_check_tx_rejected_total",
            "Transactions refused by check_tx",
        )?;
        let deliver_tx_accepted = counter(
            &registry,
            "tessera_deliver_tx_accepted_total",
            "Transactions accepted into a block",
        )?;
        let deliver_tx_rejected = counter(
            &registry,
            "tessera_deliver_tx_rejected_total",
            "Transactions excluded from a block",
        )?;
        let double_spends = counter(
            &registry,
            "tessera_double_spends_total",
            "Rejected double spend attempts",
        )?;
        let commits = counter(&registry, "tessera_commits_total", "Blocks committed")?;
        let commit_failures = counter(
            &registry,
            "tessera_commit_failures_total",
            "Block commits that failed to persist",
        )?;
        let replicated = counter(
            &registry,
            "tessera_replicated_total",
            "Transactions written by legacy peer replication",
        )?;

        let height = gauge(&registry, "tessera_height", "Last committed height")?;
        let utxo_count = gauge(&registry, "tessera_utxo_count", "Current unspent outputs")?;

        // 0.5 ms to ~8 s.
        let commit_time_ms = register_histogram_with_registry!(
            HistogramOpts::new("tessera_commit_time_ms", "Block commit time in milliseconds")
                .buckets(prometheus::exponential_buckets(0.5, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            check_tx_accepted,
            check_tx_rejected,
            deliver_tx_accepted,
            deliver_tx_rejected,
            double_spends,
            commits,
            commit_failures,
            replicated,
            height,
            utxo_count,
            commit_time_ms,
        })
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, NodeError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| NodeError::Other(e.to_string()))
    }
}
