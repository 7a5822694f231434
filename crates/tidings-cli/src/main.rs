use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tidings_client::assembly::{build_pipeline, build_sources};
use tidings_core::config::TidingsConfig;
use tidings_core::dedup::Deduplicator;
use tidings_core::gate::RunGate;
use tidings_core::scheduler::{Scheduler, TracingSchedulerReporter};
use tidings_core::state::{JsonFileStore, LAST_RUN_KEY, SEEN_KEY};
use tidings_core::traits::SystemClock;

#[derive(Parser)]
#[command(name = "tidings", version, about = "Financial headline relay for Telegram")]
struct Cli {
    /// Directory holding seen.json and last_run.json
    #[arg(long, global = true, env = "TIDINGS_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one cycle (subject to the minimum interval) and print the report
    Run,

    /// Run cycles on a timer until interrupted
    Watch {
        /// Seconds between ticks (defaults to TIDINGS_TICK_SECS)
        #[arg(long)]
        tick_secs: Option<u64>,
    },

    /// Read every source and list what would be considered, without publishing
    Fetch,

    /// Inspect or reset persisted state
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Show the seen-list size and last run time
    Show,

    /// Forget persisted state
    Reset {
        /// Only clear the seen list
        #[arg(long, conflicts_with = "last_run_only")]
        seen_only: bool,

        /// Only clear the last run time
        #[arg(long)]
        last_run_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tidings=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = TidingsConfig::from_env().context("Invalid configuration")?;
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }

    match cli.command {
        Commands::Run => cmd_run(&config).await?,
        Commands::Watch { tick_secs } => {
            if let Some(secs) = tick_secs {
                anyhow::ensure!(secs > 0, "--tick-secs must be at least 1");
                config.tick = std::time::Duration::from_secs(secs);
            }
            cmd_watch(&config).await?;
        }
        Commands::Fetch => cmd_fetch(&config).await?,
        Commands::State { action } => match action {
            StateAction::Show => cmd_state_show(&config)?,
            StateAction::Reset {
                seen_only,
                last_run_only,
            } => cmd_state_reset(&config, !last_run_only, !seen_only)?,
        },
    }

    Ok(())
}

async fn cmd_run(config: &TidingsConfig) -> Result<()> {
    let mut pipeline = build_pipeline(config).context("Failed to assemble pipeline")?;
    let report = pipeline.run_once().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_watch(config: &TidingsConfig) -> Result<()> {
    let pipeline = build_pipeline(config).context("Failed to assemble pipeline")?;
    let pipeline = Arc::new(Mutex::new(pipeline));
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing current cycle");
        }
        shutdown.cancel();
    });

    let cycles = Scheduler::new(config.tick)
        .run(pipeline, cancel, &TracingSchedulerReporter)
        .await;

    tracing::info!(cycles, "Watch stopped");
    Ok(())
}

async fn cmd_fetch(config: &TidingsConfig) -> Result<()> {
    let sources = build_sources(config).context("Failed to build sources")?;
    let dedup = Deduplicator::load(
        JsonFileStore::new(config.state_dir.clone()),
        config.seen_capacity,
    );

    let results = futures::future::join_all(sources.iter().map(|s| s.read())).await;

    for (source, result) in sources.iter().zip(results) {
        println!("{}", source.name());
        match result {
            Ok(items) if items.is_empty() => println!("  (no entries)"),
            Ok(items) => {
                for item in items {
                    let marker = if dedup.is_new(&item.key()) { "new " } else { "seen" };
                    println!("  [{marker}] {} <{}>", item.title, item.link);
                    if let Some(image) = &item.image {
                        println!("         image: {image}");
                    }
                }
            }
            Err(e) => println!("  error: {e}"),
        }
    }

    Ok(())
}

fn cmd_state_show(config: &TidingsConfig) -> Result<()> {
    let store = JsonFileStore::new(config.state_dir.clone());
    let dedup = Deduplicator::load(store.clone(), config.seen_capacity);
    let gate = RunGate::load(store, SystemClock, config.min_interval);

    println!("State directory: {}", config.state_dir.display());
    println!(
        "Seen keys:       {} / {}",
        dedup.seen().len(),
        dedup.seen().capacity()
    );
    match gate.last_run() {
        Some(at) => println!("Last run:        {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last run:        never"),
    }
    if gate.allowed() {
        println!("Next cycle:      allowed now");
    } else {
        println!("Next cycle:      in {}s", gate.remaining().as_secs());
    }

    Ok(())
}

fn cmd_state_reset(config: &TidingsConfig, seen: bool, last_run: bool) -> Result<()> {
    let store = JsonFileStore::new(config.state_dir.clone());

    if seen {
        store
            .remove(SEEN_KEY)
            .context("Failed to clear the seen list")?;
        println!("Cleared {}", store.record_path(SEEN_KEY).display());
    }
    if last_run {
        store
            .remove(LAST_RUN_KEY)
            .context("Failed to clear the last run time")?;
        println!("Cleared {}", store.record_path(LAST_RUN_KEY).display());
    }

    Ok(())
}
