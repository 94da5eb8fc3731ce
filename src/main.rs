use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use thinmint::clock::SystemClock;
use thinmint::config::{default_config_path, ResolvedConfig};
use thinmint::days::format_days;
use thinmint::engine::ReconcileEngine;
use thinmint::models::Id;
use thinmint::review::{ack_all, format_account_line, format_transaction_line, list_unacked};
use thinmint::storage::{AccountQuery, JsonFileStorage, Storage};
use thinmint::sync::{sync_users, FileAggregator, UserSync};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "thinmint")]
#[command(about = "Reconcile aggregator transactions, balances and tags")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show current configuration
    Config,
    /// Ingest downloaded payloads and run every reconciliation stage
    Sync {
        /// User to sync (repeatable); defaults to the configured users
        #[arg(short, long = "user")]
        users: Vec<String>,
        /// Directory holding one payload subdirectory per user
        #[arg(long)]
        source: PathBuf,
    },
    /// Re-run the reconciliation stages without ingesting
    Reconcile {
        #[arg(short, long)]
        user: String,
    },
    /// List unreviewed transactions and active account balances
    Review {
        #[arg(short, long)]
        user: String,
    },
    /// Mark every unreviewed transaction reviewed
    Ack {
        #[arg(short, long)]
        user: String,
    },
    /// Rebuild weekly balance history
    Backfill {
        #[arg(short, long)]
        user: String,
    },
    /// Recompute per-account performance windows
    Performance {
        #[arg(short, long)]
        user: String,
    },
}

fn open_storage(data_dir: &Path, user: &str) -> Result<Arc<dyn Storage>> {
    let storage = JsonFileStorage::new(data_dir, &Id::from(user))
        .with_context(|| format!("Invalid user id: {user}"))?;
    Ok(Arc::new(storage))
}

fn engine_for(config: &ResolvedConfig, user: &str) -> Result<ReconcileEngine> {
    Ok(ReconcileEngine::new(
        open_storage(&config.data_dir, user)?,
        config.engine.clone(),
    ))
}

async fn run_sync(config: &ResolvedConfig, users: Vec<String>, source: &Path) -> Result<()> {
    let users = if users.is_empty() {
        config.users.clone()
    } else {
        users
    };
    anyhow::ensure!(
        !users.is_empty(),
        "No users given and none configured in {}",
        config.data_dir.display()
    );

    let mut jobs = Vec::with_capacity(users.len());
    for user in users {
        jobs.push(UserSync {
            storage: open_storage(&config.data_dir, &user)?,
            aggregator: Arc::new(FileAggregator::new(source.join(&user))),
            user: Id::from(user),
        });
    }

    let mut failed = 0;
    for (user, result) in sync_users(jobs, &config.engine, Arc::new(SystemClock)).await {
        match result {
            Ok(report) => println!(
                "{user}: ingested {} new / {} refreshed ({} skipped), matched {}, resynced {}, backfilled {}",
                report.ingest.transactions_inserted,
                report.ingest.transactions_refreshed,
                report.ingest.skipped.len(),
                report.engine.matching.matched.len(),
                report.engine.resync.resynced.len(),
                report.engine.backfill.records_written
                    + report.engine.backfill.aggregate_records_written,
            ),
            Err(err) => {
                failed += 1;
                eprintln!("{user}: sync failed: {err:#}");
            }
        }
    }
    anyhow::ensure!(failed == 0, "{failed} user sync(s) failed");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .json(),
        )
        .init();

    let cli = Cli::parse();

    let config = ResolvedConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load thinmint config: {}", cli.config.display()))?;

    match cli.command {
        Command::Config => {
            println!("Config file: {}", cli.config.display());
            println!("Data directory: {}", config.data_dir.display());
            println!("Users: {}", config.users.join(", "));
            println!(
                "Match window: {}",
                format_days(config.engine.match_window_days)
            );
            println!(
                "Backfill step: {}",
                format_days(config.engine.backfill_step_days)
            );
            println!("Investment tag: {}", config.engine.investment_tag);
        }
        Command::Sync { users, source } => run_sync(&config, users, &source).await?,
        Command::Reconcile { user } => {
            let report = engine_for(&config, &user)?.run().await?;
            println!(
                "{user}: matched {}, resynced {}, ambiguous {}, tags {}, backfilled {}",
                report.matching.matched.len(),
                report.resync.resynced.len(),
                report.resync.ambiguous.len(),
                report.taxonomy.tags.len(),
                report.backfill.records_written + report.backfill.aggregate_records_written,
            );
        }
        Command::Review { user } => {
            let storage = open_storage(&config.data_dir, &user)?;
            let unacked = list_unacked(storage.as_ref()).await?;
            for txn in &unacked {
                println!("{}", format_transaction_line(txn));
            }
            for account in storage.list_accounts(&AccountQuery::active()).await? {
                println!("{}", format_account_line(&account));
            }
            println!("{user}: {} transaction(s) to review", unacked.len());
        }
        Command::Ack { user } => {
            let storage = open_storage(&config.data_dir, &user)?;
            let count = ack_all(storage.as_ref()).await?;
            println!("{user}: acknowledged {count} transaction(s)");
        }
        Command::Backfill { user } => {
            let report = engine_for(&config, &user)?.backfill().await?;
            println!(
                "{user}: wrote {} account and {} aggregate snapshot(s)",
                report.records_written, report.aggregate_records_written
            );
        }
        Command::Performance { user } => {
            let report = engine_for(&config, &user)?.update_performance().await?;
            println!(
                "{user}: updated {} account(s), {} window(s) used the first snapshot",
                report.accounts_updated, report.fallbacks
            );
        }
    }

    Ok(())
}
