//! soundindex CLI: run and inspect the SoundChain chain watcher.
//!
//! # Commands
//! ```text
//! soundindex poll                  run one cycle and print the outcome
//! soundindex watch                 poll every interval until Ctrl-C
//! soundindex status                saved cursor, dead letters, journal size
//! soundindex reset --to <block>    overwrite (or clear) the cursor
//! soundindex failed --limit <n>    list dead-lettered events
//! soundindex contracts             built-in event signatures and topic0s
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use soundindex_core::{
    ContractId, CursorStore, CursorTracker, FailedEventStore, StaticActorDirectory, SystemActor,
};
use soundindex_evm::abi::soundchain;
use soundindex_evm::{HttpChainClient, Watcher, WatcherBuilder};
use soundindex_storage::{JournalHandler, SqliteStorage};

mod config;
mod logging;

use config::Config;

#[derive(Parser)]
#[command(
    name = "soundindex",
    about = "SoundChain chain watcher: indexes marketplace, NFT, and auction events",
    long_about = "
Polls the six SoundChain contracts (marketplace, NFT, and auction, v1 and v2),
routes their events to the domain handlers, and advances a durable block
cursor once every handler has succeeded.

ENVIRONMENT VARIABLES:
  SOUNDINDEX_RPC_URL   JSON-RPC endpoint (overrides [rpc].url)
  SOUNDINDEX_DB        SQLite path (overrides [storage].sqlite_path)
  RUST_LOG             tracing filter (overrides [log])
",
    version
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true, default_value = "soundindex.toml")]
    config: PathBuf,

    /// JSON-RPC endpoint
    #[arg(long, global = true, env = "SOUNDINDEX_RPC_URL")]
    rpc_url: Option<String>,

    /// SQLite database path
    #[arg(long, global = true, env = "SOUNDINDEX_DB")]
    db: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single poll cycle
    Poll,

    /// Poll continuously until Ctrl-C
    Watch,

    /// Show the saved cursor and store counters
    Status,

    /// Overwrite the cursor. Without --to the saved cursor is removed and the
    /// next cycle starts from `watcher.start_block`.
    Reset {
        /// Next block to fetch
        #[arg(long)]
        to: Option<u64>,
    },

    /// List dead-lettered events, newest first
    Failed {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Print the built-in event signatures of each contract
    Contracts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(url) = cli.rpc_url.clone() {
        cfg.rpc.url = Some(url);
    }
    if let Some(db) = cli.db.clone() {
        cfg.storage.sqlite_path = db;
    }
    if cli.verbose {
        cfg.log.level = "debug".into();
    }
    logging::init_tracing(&cfg.log);

    match cli.command {
        Commands::Poll => cmd_poll(&cfg).await,
        Commands::Watch => cmd_watch(&cfg).await,
        Commands::Status => cmd_status(&cfg).await,
        Commands::Reset { to } => cmd_reset(&cfg, to).await,
        Commands::Failed { limit } => cmd_failed(&cfg, limit).await,
        Commands::Contracts => cmd_contracts(&cfg),
    }
}

async fn open_storage(cfg: &Config) -> Result<SqliteStorage> {
    SqliteStorage::open(&cfg.storage.sqlite_path)
        .await
        .with_context(|| format!("opening database {}", cfg.storage.sqlite_path))
}

async fn build_watcher(cfg: &Config, storage: SqliteStorage) -> Result<Watcher> {
    let url = cfg
        .rpc
        .url
        .as_deref()
        .ok_or_else(|| anyhow!("no RPC URL: set [rpc].url, --rpc-url, or SOUNDINDEX_RPC_URL"))?;
    let client = HttpChainClient::new(url, cfg.rpc.client_config())?;

    let storage = Arc::new(storage);
    let handler = Arc::new(JournalHandler::new(storage.clone()));

    let mut builder = WatcherBuilder::with_config(cfg.watcher().clone())
        .client(Arc::new(client))
        .cursor_store(Box::new(SqliteStorage::clone(&storage)))
        .contracts(cfg.contracts.clone())
        .marketplace_handler(handler.clone())
        .nft_handler(handler.clone())
        .auction_handler(handler)
        .dead_letters(storage);

    builder = match &cfg.actor.system_user_id {
        Some(id) => builder.actor(SystemActor::new(id.clone(), cfg.watcher().system_handle.clone())),
        None => builder.actor_directory(Arc::new(StaticActorDirectory::from(
            cfg.actor.users.clone(),
        ))),
    };

    Ok(builder.build().await?)
}

async fn cmd_poll(cfg: &Config) -> Result<()> {
    let watcher = build_watcher(cfg, open_storage(cfg).await?).await?;
    let outcome = watcher.poll_once().await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn cmd_watch(cfg: &Config) -> Result<()> {
    let watcher = build_watcher(cfg, open_storage(cfg).await?).await?;
    watcher
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
            }
        })
        .await?;
    Ok(())
}

async fn cmd_status(cfg: &Config) -> Result<()> {
    let storage = open_storage(cfg).await?;
    let w = cfg.watcher();
    let saved = storage.load(&w.id).await?;

    println!("watcher        {}", w.id);
    println!("chain          {}", w.chain);
    match saved {
        Some(cursor) => println!(
            "next block     {} (saved at {})",
            cursor.block_number, cursor.updated_at
        ),
        None => println!("next block     {} (start_block, nothing saved)", w.start_block),
    }
    println!("dead letters   {}", storage.count().await?);
    println!("journaled      {}", storage.event_count().await?);
    Ok(())
}

async fn cmd_reset(cfg: &Config, to: Option<u64>) -> Result<()> {
    let storage = open_storage(cfg).await?;
    let w = cfg.watcher();
    let tracker = CursorTracker::new(Box::new(storage), w.id.clone(), w.start_block);
    match to {
        Some(block) => {
            tracker.update_current_block_number(block).await?;
            println!("cursor for '{}' set to {block}", w.id);
        }
        None => {
            tracker.reset().await?;
            println!("cursor for '{}' cleared; next run starts at {}", w.id, w.start_block);
        }
    }
    Ok(())
}

async fn cmd_failed(cfg: &Config, limit: usize) -> Result<()> {
    let storage = open_storage(cfg).await?;
    let failed = storage.list(limit).await?;
    println!("{}", serde_json::to_string_pretty(&failed)?);
    Ok(())
}

fn cmd_contracts(cfg: &Config) -> Result<()> {
    for id in ContractId::ALL {
        let abi = soundchain::contract_abi(id)?;
        let address = cfg.contracts.get(id).unwrap_or("(not configured)");
        println!("{id}  {address}");
        for event in abi.events() {
            println!("    {}  {}", event.topic0(), event.signature());
        }
    }
    Ok(())
}
