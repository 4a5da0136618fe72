//! Tessera daemon: entry point for running and inspecting a tessera node.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tessera_node::{
    broadcast_client, commit_within, forward_backlog, init_logging, spawn_peer_listeners,
    verify_chain, AppState, BlockHeader, FileFeed, Genesis, LogFormat, NodeConfig,
    ShutdownController,
};
use tessera_consensus::{BlockProposal, Vote};
use tessera_transactions::{decode_transaction, Transaction};
use tessera_types::{PublicKey, Signature, Timestamp};

/// How often peer change logs are polled.
const PEER_POLL: Duration = Duration::from_secs(1);

/// How often the replication backlog is forwarded to the consensus engine.
const FORWARD_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "tessera-daemon", about = "Tessera ledger node daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for ledger storage.
    #[arg(long, env = "TESSERA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Consensus rules: "engine" or "voting".
    #[arg(long, env = "TESSERA_RULES")]
    rules: Option<String>,

    /// JSON-RPC endpoint of the consensus engine.
    #[arg(long, env = "TESSERA_ENGINE_RPC_URL")]
    engine_rpc_url: Option<String>,

    /// Legacy replication peer change logs (comma-separated paths).
    #[arg(long, env = "TESSERA_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Collect Prometheus metrics.
    #[arg(long, env = "TESSERA_ENABLE_METRICS")]
    metrics: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TESSERA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "TESSERA_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Bind the data directory to a genesis document.
    Init {
        /// Genesis document (JSON).
        #[arg(long)]
        genesis: PathBuf,
    },
    /// Print the last committed height and app hash.
    Info,
    /// Look up committed state, e.g. `height`, `tx/<id>`, `utxo/<id>/<index>`.
    Query { path: String },
    /// Replay the stored chain and check it against the durable state.
    Verify,
    /// Submit a transaction (JSON) to the consensus engine.
    Submit {
        #[arg(long)]
        tx: PathBuf,
        /// "async", "sync", "commit" or a full `broadcast_tx_*` method name.
        #[arg(long, default_value = "async")]
        mode: String,
        /// Overrides the configured engine endpoint.
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Apply a block of wire-encoded transactions through the bridge.
    Apply {
        /// Block file: `{"height": n, "time": secs, "txs": ["<base64>", ...]}`.
        #[arg(long)]
        block: PathBuf,
    },
    /// Judge a block proposed elsewhere against the last commit and tally
    /// the votes cast on it. Writes nothing.
    CheckBlock {
        /// Proposal file: `{"height": n, "txs": [...], "proposer": hex,
        /// "signature": hex, "votes": [...]}`.
        #[arg(long)]
        block: PathBuf,
    },
    /// Run legacy peer replication until interrupted.
    Run,
}

#[derive(Deserialize)]
struct BlockFile {
    height: u64,
    #[serde(default)]
    time: Option<u64>,
    txs: Vec<String>,
}

#[derive(Deserialize)]
struct ProposalFile {
    height: u64,
    txs: Vec<String>,
    #[serde(default)]
    proposer: Option<PublicKey>,
    #[serde(default)]
    signature: Option<Signature>,
    #[serde(default)]
    votes: Vec<Vote>,
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let base = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            NodeConfig::from_toml_file(&path).with_context(|| format!("loading {path}"))?
        }
        None => NodeConfig::default(),
    };

    let config = NodeConfig {
        data_dir: cli.data_dir.clone().unwrap_or(base.data_dir.clone()),
        rules: match &cli.rules {
            Some(name) => name.parse()?,
            None => base.rules,
        },
        engine_rpc_url: cli
            .engine_rpc_url
            .clone()
            .unwrap_or(base.engine_rpc_url.clone()),
        peers: if cli.peers.is_empty() {
            base.peers.clone()
        } else {
            cli.peers.clone()
        },
        enable_metrics: cli.metrics || base.enable_metrics,
        log_level: cli.log_level.clone().unwrap_or(base.log_level.clone()),
        log_format: cli.log_format.clone().unwrap_or(base.log_format.clone()),
        ..base
    };
    config.validate()?;
    Ok(config)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format.parse::<LogFormat>()?, &config.log_level)?;

    match cli.command {
        Command::Init { genesis } => {
            let genesis = Genesis::from_json_file(&genesis.to_string_lossy())?;
            let state = AppState::open(config)?;
            let mut bridge = state.bridge()?;
            bridge.init_chain(&genesis)?;
            print_json(&bridge.info())?;
        }
        Command::Info => {
            let state = AppState::open(config)?;
            let bridge = state.bridge()?;
            print_json(&bridge.info())?;
            let summary = bridge.ledger().summary()?;
            println!(
                "blocks: {}  transactions: {}  utxos: {}",
                summary.blocks, summary.transactions, summary.utxos
            );
        }
        Command::Query { path } => {
            let state = AppState::open(config)?;
            let response = state.bridge()?.query(&path);
            print_json(&response)?;
            if response.code != 0 {
                std::process::exit(1);
            }
        }
        Command::Verify => {
            let state = AppState::open(config)?;
            let bridge = state.bridge()?;
            let report = verify_chain(bridge.ledger(), state.rules.as_ref())?;
            println!(
                "chain ok: height {}  transactions {}  utxos {}  app_hash {}",
                report.height, report.transactions, report.utxos, report.app_hash
            );
        }
        Command::Submit { tx, mode, endpoint } => {
            let bytes = std::fs::read(&tx).with_context(|| format!("reading {}", tx.display()))?;
            let transaction = Transaction::from_json_bytes(&bytes)?;
            let mut config = config;
            if let Some(endpoint) = endpoint {
                config.engine_rpc_url = endpoint;
            }
            // Submission needs no ledger, so the store stays closed.
            let client = broadcast_client(&config);
            let result = client.write_transaction(&transaction, &mode).await?;
            print_json(&result)?;
        }
        Command::Apply { block } => {
            let bytes =
                std::fs::read(&block).with_context(|| format!("reading {}", block.display()))?;
            let block: BlockFile = serde_json::from_slice(&bytes)?;
            let timeout = config.commit_timeout();
            let state = AppState::open(config)?;
            let mut bridge = state.bridge()?;
            bridge.begin_block(BlockHeader {
                height: block.height,
                time: block.time.map(Timestamp::new).unwrap_or_else(Timestamp::now),
            })?;
            for (index, raw) in block.txs.iter().enumerate() {
                let result = bridge.deliver_tx(raw.as_bytes());
                if !result.accepted {
                    tracing::warn!(index, reason = ?result.reason, "transaction excluded from block");
                }
            }
            let shared = Arc::new(tokio::sync::Mutex::new(bridge));
            let app_hash = commit_within(Arc::clone(&shared), timeout).await?;
            println!("committed height {}  app_hash {app_hash}", block.height);
        }
        Command::CheckBlock { block } => {
            let bytes =
                std::fs::read(&block).with_context(|| format!("reading {}", block.display()))?;
            let file: ProposalFile = serde_json::from_slice(&bytes)?;
            let transactions = file
                .txs
                .iter()
                .enumerate()
                .map(|(index, raw)| {
                    decode_transaction(raw.as_bytes())
                        .with_context(|| format!("decoding transaction {index}"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let mut proposal = BlockProposal::new(file.height, transactions);
            proposal.proposer = file.proposer;
            proposal.signature = file.signature;

            let state = AppState::open(config)?;
            let bridge = state.bridge()?;
            let check = bridge.cross_check(&proposal, &state.config.voters, &file.votes)?;
            print_json(&check)?;
        }
        Command::Run => run(config).await?,
    }

    Ok(())
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let retry = config.peer_retry();
    let enable_metrics = config.enable_metrics;
    let state = AppState::open(config)?;
    let replicator = Arc::new(state.replicator());
    let client = state.broadcast_client();
    let shutdown = ShutdownController::new();

    let feeds: Vec<FileFeed> = state.config.peers.iter().map(FileFeed::new).collect();
    tracing::info!(peers = feeds.len(), rules = state.rules.name(), "starting tessera node");
    let mut handles =
        spawn_peer_listeners(feeds, Arc::clone(&replicator), &shutdown, PEER_POLL, retry);

    // Forward replicated transactions to the consensus engine.
    let mut shutdown_rx = shutdown.subscribe();
    let forward_replicator = Arc::clone(&replicator);
    let metrics = Arc::clone(&state.metrics);
    handles.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(FORWARD_INTERVAL);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("forwarder shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let forwarded = forward_backlog(&*forward_replicator, &client).await;
                    if forwarded > 0 {
                        tracing::debug!(forwarded, "replicated transactions forwarded");
                    }
                    if enable_metrics {
                        match metrics.encode_text() {
                            Ok(text) => tracing::trace!(metrics = %text, "metrics snapshot"),
                            Err(e) => tracing::warn!(error = %e, "cannot encode metrics"),
                        }
                    }
                }
            }
        }
    }));

    shutdown.wait_for_signal().await;
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "background task ended abnormally");
        }
    }
    tracing::info!("tessera daemon exited cleanly");
    Ok(())
}
