//! Obscurity CLI
//!
//! Commit encrypted payloads, grind them into pay-to-pubkey keys and find
//! them again on chain.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use obscurity_core::constants::{DEFAULT_DIFFICULTY_BITS, DEFAULT_SCAN_INTERVAL_SECS, DEFAULT_SCAN_LOOKBACK, DEFAULT_WORKERS};
use obscurity_core::traits::{BlockStore, SearcherFactory};
use obscurity_core::types::{Block, BlockStatus, Difficulty, GrindProgress, GrindProgressCallback, Lockbox, PayloadKind};
use obscurity_crypto::sha256;
use obscurity_grind::{forge_lockbox, GrindConfig, GrindPool, LocalFactory, ProcessFactory, WorkerCommand};
use obscurity_registry::{append_block, create_anchor, fork_chain, FileStore};
use obscurity_rpc::{RpcClient, RpcConfig};
use obscurity_scanner::{
    confirm_block, link_block, recheck_block, spawn_watcher, ChainScanner, PendingIndex,
    ScanCallback, ScanConfig, ScanSummary, WatchConfig,
};
use obscurity_stego::{embed_bytes, encode_keys, plan, CommitParams, Payload};

/// Obscurity - encrypted payloads hidden in ground pay-to-pubkey outputs
#[derive(Parser)]
#[command(name = "obscurity")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Directory holding chains, blocks and lockboxes
    #[arg(long, global = true, env = "OBSCURITY_DATA_DIR", default_value = "./obscurity_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Node connection flags; unset flags fall back to `OBSCURITY_RPC_*`.
#[derive(Args, Clone, Debug, Default)]
struct NodeArgs {
    /// Node RPC URL
    #[arg(long)]
    rpc_url: Option<String>,
    /// Node RPC user
    #[arg(long)]
    rpc_user: Option<String>,
    /// Node RPC password
    #[arg(long)]
    rpc_password: Option<String>,
    /// Request timeout in seconds
    #[arg(long)]
    rpc_timeout: Option<u64>,
}

impl NodeArgs {
    fn config(&self) -> RpcConfig {
        let mut config = RpcConfig::from_env();
        if let Some(url) = &self.rpc_url {
            config.url = url.clone();
        }
        if let Some(user) = &self.rpc_user {
            config.user = Some(user.clone());
        }
        if let Some(password) = &self.rpc_password {
            config.password = Some(password.clone());
        }
        if let Some(timeout) = self.rpc_timeout {
            config.timeout_seconds = timeout;
        }
        config
    }

    fn client(&self) -> Result<RpcClient> {
        RpcClient::new(self.config()).context("Invalid node settings")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new chain
    Anchor {
        /// Chain name
        name: String,
    },

    /// Start a chain from a prefix of another
    Fork {
        /// Source chain id
        chain: String,
        /// Last block index to copy
        at: u64,
        /// Name of the new chain
        name: String,
    },

    /// List chains
    Chains,

    /// List a chain's blocks
    Blocks {
        /// Chain id
        chain: String,
    },

    /// Encrypt a payload into the next block of a chain
    Commit {
        /// Chain id
        chain: String,
        /// Text to commit
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        text: Option<String>,
        /// Commit the SHA-256 of this file instead of text
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Passphrase (defaults to the chain id)
        #[arg(short, long)]
        passphrase: Option<String>,
        /// Grind the scrambled block hash instead of the ciphertext
        #[arg(long)]
        scramble: bool,
    },

    /// Grind keys for a committed block and write its lockbox
    Grind {
        /// Chain id
        chain: String,
        /// Block index
        index: u64,
        /// Concurrent workers
        #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,
        /// Difficulty in bits (multiple of 8)
        #[arg(short, long, default_value_t = DEFAULT_DIFFICULTY_BITS)]
        difficulty: u16,
        /// Search in-process instead of spawning the key-search binary
        #[arg(long)]
        local: bool,
        /// Path to the key-search binary
        #[arg(long, env = "OBSCURITY_GRINDER")]
        grinder: Option<PathBuf>,
        /// Seconds to wait for each key before giving up on a worker
        #[arg(long)]
        timeout: Option<u64>,
        /// Abort on the first worker failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Attach a candidate transaction id to a ground block
    Link {
        /// Chain id
        chain: String,
        /// Block index
        index: u64,
        /// Transaction id
        txid: String,
    },

    /// Check that a transaction carries a block and mark it verified
    Verify {
        /// Chain id
        chain: String,
        /// Block index
        index: u64,
        /// Transaction id
        txid: String,
        /// For file-hash blocks, the file to compare against
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        node: NodeArgs,
    },

    /// Scan recent chain blocks once for pending blocks
    Scan {
        /// Blocks to scan back from the tip
        #[arg(short, long, default_value_t = DEFAULT_SCAN_LOOKBACK)]
        lookback: u64,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        node: NodeArgs,
    },

    /// Keep scanning until interrupted
    Watch {
        /// Seconds between scans
        #[arg(short, long, default_value_t = DEFAULT_SCAN_INTERVAL_SECS)]
        interval: u64,
        /// Blocks to scan back from the tip
        #[arg(short, long, default_value_t = DEFAULT_SCAN_LOOKBACK)]
        lookback: u64,
        #[command(flatten)]
        node: NodeArgs,
    },

    /// Test the node connection
    Node {
        #[command(flatten)]
        node: NodeArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "obscurity=debug,info"
    } else {
        "obscurity=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(cli.log_json.then(|| fmt::layer().json()))
        .with((!cli.log_json).then(fmt::layer))
        .init();

    let data_dir = cli.data_dir;
    match cli.command {
        Commands::Node { node } => cmd_node(&node).await,
        command => {
            debug!(data_dir = %data_dir.display(), "Opening store");
            let store = Arc::new(
                FileStore::open(&data_dir)
                    .await
                    .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?,
            );
            run(command, store).await
        }
    }
}

async fn run(command: Commands, store: Arc<FileStore>) -> Result<()> {
    match command {
        Commands::Anchor { name } => cmd_anchor(&store, &name).await,
        Commands::Fork { chain, at, name } => cmd_fork(&store, &chain, at, &name).await,
        Commands::Chains => cmd_chains(&store).await,
        Commands::Blocks { chain } => cmd_blocks(&store, &chain).await,
        Commands::Commit {
            chain,
            text,
            file,
            passphrase,
            scramble,
        } => cmd_commit(&store, &chain, text, file.as_deref(), passphrase, scramble).await,
        Commands::Grind {
            chain,
            index,
            workers,
            difficulty,
            local,
            grinder,
            timeout,
            fail_fast,
        } => {
            let difficulty = Difficulty::new(difficulty).context("Invalid difficulty")?;
            let mut config = GrindConfig::new().workers(workers).difficulty(difficulty);
            if let Some(secs) = timeout {
                config = config.response_timeout(Duration::from_secs(secs));
            }
            if fail_fast {
                config = config.fail_fast();
            }

            if local {
                cmd_grind(&store, &chain, index, LocalFactory::new(), config).await
            } else {
                let command = WorkerCommand::locate(grinder.as_deref())
                    .context("Key-search binary not found (use --grinder or --local)")?;
                let factory = ProcessFactory::new(command).with_response_timeout(config.response_timeout);
                cmd_grind(&store, &chain, index, factory, config).await
            }
        }
        Commands::Link { chain, index, txid } => cmd_link(&store, &chain, index, &txid).await,
        Commands::Verify {
            chain,
            index,
            txid,
            file,
            node,
        } => cmd_verify(&store, &node, &chain, index, &txid, file.as_deref()).await,
        Commands::Scan { lookback, json, node } => cmd_scan(store, &node, lookback, json).await,
        Commands::Watch {
            interval,
            lookback,
            node,
        } => cmd_watch(store, &node, interval, lookback).await,
        Commands::Node { node } => cmd_node(&node).await,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAINS & BLOCKS
// ═══════════════════════════════════════════════════════════════════════════════

async fn cmd_anchor(store: &FileStore, name: &str) -> Result<()> {
    let chain = create_anchor(store, name).await.context("Failed to create chain")?;
    println!("{} {} ({})", "⚓ Anchor created:".green().bold(), chain.name, chain.id.yellow());
    Ok(())
}

async fn cmd_fork(store: &FileStore, source: &str, at: u64, name: &str) -> Result<()> {
    let chain = fork_chain(store, source, at, name)
        .await
        .context("Failed to fork chain")?;
    println!(
        "{} {} ({}) from {} at block {}",
        "🍴 Fork created:".green().bold(),
        chain.name,
        chain.id.yellow(),
        source,
        at
    );
    Ok(())
}

async fn cmd_chains(store: &FileStore) -> Result<()> {
    let chains = store.chains().await?;
    if chains.is_empty() {
        println!("{}", "No chains yet. Create one with `obscurity anchor <name>`.".yellow());
        return Ok(());
    }

    for chain in chains {
        let blocks = store.blocks(&chain.id).await?;
        let verified = blocks.iter().filter(|b| b.status() == BlockStatus::Verified).count();
        let origin = match (&chain.parent_chain, chain.fork_index) {
            (Some(parent), Some(at)) => format!("fork of {} at {}", parent, at),
            _ => "anchor".to_string(),
        };
        println!(
            "{}  {:<24} {:>3} block(s), {} verified  {}",
            chain.id.yellow(),
            chain.name,
            blocks.len(),
            verified,
            origin.dimmed()
        );
    }
    Ok(())
}

fn status_label(status: BlockStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        BlockStatus::Unlinked => label.dimmed(),
        BlockStatus::ReadyToLink => label.cyan(),
        BlockStatus::Linked => label.yellow(),
        BlockStatus::Verified => label.green().bold(),
    }
}

fn print_block(block: &Block) {
    let short = block.header.block_hash.get(..16).unwrap_or(&block.header.block_hash);
    println!(
        "  #{:<4} {:<14} {}…  {}",
        block.index(),
        status_label(block.status()),
        short,
        block.content.preview
    );
    if !block.steganography.keys.is_empty() {
        println!("        {} key(s)", block.steganography.keys.len());
    }
    if let Some(txid) = &block.header.txid {
        println!("        txid {}", txid.dimmed());
    }
}

async fn cmd_blocks(store: &FileStore, chain_id: &str) -> Result<()> {
    let chain = store.get_chain(chain_id).await?;
    let blocks = store.blocks(chain_id).await?;
    println!("{} {} ({})", "⛓  Chain".cyan().bold(), chain.name, chain.id.yellow());
    if blocks.is_empty() {
        println!("   {}", "(empty)".dimmed());
    }
    for block in &blocks {
        print_block(block);
    }
    Ok(())
}

async fn cmd_commit(
    store: &FileStore,
    chain_id: &str,
    text: Option<String>,
    file: Option<&Path>,
    passphrase: Option<String>,
    scramble: bool,
) -> Result<()> {
    let payload = match (text, file) {
        (_, Some(path)) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string());
            Payload::file_hash(name, bytes)
        }
        (Some(text), None) => Payload::text("message.txt", text.into_bytes()),
        (None, None) => bail!("Nothing to commit: pass text or --file"),
    };

    let mut params = CommitParams::for_chain(chain_id);
    if let Some(passphrase) = passphrase {
        params = params.with_passphrase(passphrase);
    }
    if scramble {
        params = params.scrambled();
    }

    let block = append_block(store, chain_id, payload, &params)
        .await
        .context("Failed to commit block")?;
    let chunks = plan(&embed_bytes(&block)?, Difficulty::default()).total_chunks;

    println!("{}", "🔒 Block committed:".green().bold());
    print_block(&block);
    println!(
        "\n   Next: {} ({} key(s) at {})",
        format!("obscurity grind {} {}", chain_id, block.index()).cyan(),
        chunks,
        Difficulty::default()
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// GRIND
// ═══════════════════════════════════════════════════════════════════════════════

async fn cmd_grind<F>(
    store: &FileStore,
    chain_id: &str,
    index: u64,
    factory: F,
    config: GrindConfig,
) -> Result<()>
where
    F: SearcherFactory + 'static,
{
    let block = store.get_block(chain_id, index).await?;
    let total = plan(&embed_bytes(&block)?, config.difficulty).total_chunks;
    println!(
        "{} {} chunk(s) at {} with {} worker(s)",
        "⛏  Grinding".cyan().bold(),
        total,
        config.difficulty,
        config.workers
    );

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg} ({elapsed})")?
            .progress_chars("#>-"),
    );
    let bar = pb.clone();
    let progress: GrindProgressCallback = Arc::new(move |p: GrindProgress| {
        bar.set_position(p.completed as u64);
        bar.set_message(format!("chunk {} by worker {} at {:.0} keys/s", p.chunk_index, p.worker_id, p.rate()));
    });

    let pool = GrindPool::new(factory, config).with_progress(progress);
    let lockbox = match forge_lockbox(store, &pool, chain_id, index).await {
        Ok(lockbox) => lockbox,
        Err(e) => {
            pb.abandon_with_message("failed");
            warn!(chain = chain_id, index, error = %e, "Grind failed");
            return Err(e).context("Grind failed");
        }
    };
    pb.finish_with_message("done");

    print_lockbox(&lockbox)
}

fn print_lockbox(lockbox: &Lockbox) -> Result<()> {
    println!("\n{}", "✅ Lockbox written".green().bold());
    println!("   {} {}", "File:".dimmed(), lockbox.file_name());
    println!("   {} {}", "Target hash:".dimmed(), lockbox.target_hash);
    println!("\n{}", "Outputs to broadcast, in this order:".yellow().bold());
    for (n, script) in encode_keys(&lockbox.keys)?.iter().enumerate() {
        println!("   {:>3}  {}", n, script.to_hex());
    }
    println!("\n{}", "ℹ️  Next steps:".cyan());
    println!("   1. Broadcast one transaction paying to the outputs above, in order");
    println!("   2. Run `obscurity link` with its txid, or let `obscurity watch` find it");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN
// ═══════════════════════════════════════════════════════════════════════════════

async fn cmd_link(store: &FileStore, chain_id: &str, index: u64, txid: &str) -> Result<()> {
    let block = link_block(store, chain_id, index, txid)
        .await
        .context("Failed to link block")?;
    println!("{}", "🔗 Block linked:".green().bold());
    print_block(&block);
    Ok(())
}

async fn cmd_verify(
    store: &FileStore,
    node: &NodeArgs,
    chain_id: &str,
    index: u64,
    txid: &str,
    file: Option<&Path>,
) -> Result<()> {
    let client = node.client()?;
    let block = store.get_block(chain_id, index).await?;
    let decoded = if block.status() == BlockStatus::Verified {
        if let Some(recorded) = block.header.txid.as_deref().filter(|t| *t != txid) {
            warn!(recorded, checked = txid, "Block was verified against another transaction");
        }
        let decoded = recheck_block(&client, store, chain_id, index, txid)
            .await
            .context("Verification failed")?;
        println!(
            "{} {} output(s) used",
            "✅ Still verified on chain:".green().bold(),
            decoded.outputs_used.len()
        );
        decoded
    } else {
        let decoded = confirm_block(&client, store, chain_id, index, txid)
            .await
            .context("Verification failed")?;
        println!(
            "{} {} output(s) used",
            "✅ Verified on chain:".green().bold(),
            decoded.outputs_used.len()
        );
        decoded
    };

    let Some(plain) = decoded.plaintext else {
        println!("   Scrambled block hash matches {}", block.header.block_hash);
        return Ok(());
    };

    match block.content.kind {
        PayloadKind::Text => {
            println!("\n{}", "Payload:".yellow().bold());
            println!("{}", String::from_utf8_lossy(&plain));
        }
        PayloadKind::FileHash => {
            println!("   {} {}", "File hash:".dimmed(), hex::encode(&plain));
            if let Some(path) = file {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                if sha256(&bytes).as_slice() == plain.as_slice() {
                    println!("   {} {}", "✅ Matches".green(), path.display());
                } else {
                    bail!("{} does not match the committed hash", path.display());
                }
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &ScanSummary) {
    let tip = summary
        .tip_height
        .map(|h| h.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "   {} blocks, {} transactions, {} candidate(s), tip {}",
        summary.blocks_scanned, summary.transactions, summary.candidates, tip
    );
    for hit in &summary.verified {
        println!(
            "   {} block {} of {} in {}",
            "✅".green(),
            hit.block_index,
            hit.chain_id.yellow(),
            hit.txid
        );
    }
}

async fn cmd_scan(store: Arc<FileStore>, node: &NodeArgs, lookback: u64, json: bool) -> Result<()> {
    let index = PendingIndex::from_store(store.as_ref()).await?;
    if !json {
        println!("{} {} pending block(s)", "🔎 Scanning for".cyan().bold(), index.len());
    }

    let scanner = ChainScanner::new(Arc::new(node.client()?), store, ScanConfig::new().lookback(lookback));
    let summary = scanner.scan_recent(&index).await.context("Scan failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    print_summary(&summary);
    if summary.verified.is_empty() {
        println!("{}", "No pending blocks found on chain yet.".yellow());
    }
    Ok(())
}

async fn cmd_watch(store: Arc<FileStore>, node: &NodeArgs, interval: u64, lookback: u64) -> Result<()> {
    if interval == 0 {
        bail!("Interval must be at least one second");
    }
    let client = node.client()?;
    client.test_connection().await.context("Node unreachable")?;

    println!(
        "{} every {}s over the last {} block(s). Press Ctrl+C to stop.",
        "👀 Watching".cyan().bold(),
        interval,
        lookback
    );

    let callback: ScanCallback = Arc::new(|summary: &ScanSummary| {
        if !summary.verified.is_empty() {
            print_summary(summary);
        }
    });
    let config = WatchConfig::new()
        .interval(Duration::from_secs(interval))
        .lookback(lookback);
    let handle = spawn_watcher(Arc::new(client), store, config, Some(callback));

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    println!("\n{}", "Stopping...".dimmed());
    handle.stop().await;
    Ok(())
}

async fn cmd_node(node: &NodeArgs) -> Result<()> {
    let client = node.client()?;
    println!("{} {}", "📡 Connecting to".cyan().bold(), client.config().url);
    let status = client.test_connection().await.context("Node unreachable")?;
    println!(
        "{} {} at height {} ({} ms)",
        "✅ Connected:".green().bold(),
        status.chain,
        status.blocks,
        status.latency_ms
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_commit_needs_text_or_file() {
        assert!(Cli::try_parse_from(["obscurity", "commit", "abcd1234"]).is_err());
        assert!(Cli::try_parse_from(["obscurity", "commit", "abcd1234", "hi", "--file", "x"]).is_err());
        assert!(Cli::try_parse_from(["obscurity", "commit", "abcd1234", "hi"]).is_ok());
    }

    #[test]
    fn test_grind_defaults() {
        let cli = Cli::try_parse_from(["obscurity", "grind", "abcd1234", "2", "--local"]).unwrap();
        match cli.command {
            Commands::Grind {
                workers,
                difficulty,
                local,
                ..
            } => {
                assert_eq!(workers, DEFAULT_WORKERS);
                assert_eq!(difficulty, DEFAULT_DIFFICULTY_BITS);
                assert!(local);
            }
            _ => panic!("expected grind"),
        }
    }

    #[test]
    fn test_node_flags_override() {
        let args = NodeArgs {
            rpc_url: Some("http://node:18443".into()),
            rpc_user: Some("alice".into()),
            rpc_password: None,
            rpc_timeout: Some(7),
        };
        let config = args.config();
        assert_eq!(config.url, "http://node:18443");
        assert_eq!(config.user.as_deref(), Some("alice"));
        assert_eq!(config.timeout_seconds, 7);
    }
}
