use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ohlcvt_core::candle::format_timestamp;
use ohlcvt_core::interval::Interval;
use ohlcvt_core::pair::Pair;
use ohlcvt_core::store::CandleStore;
use ohlcvt_loader::batch::{
    BatchReport, batch_incremental_load, batch_initial_load, incremental_load_all,
};
use ohlcvt_loader::config::LoaderConfig;
use ohlcvt_loader::incremental::FetchOutcome;
use ohlcvt_providers::kraken::KrakenProvider;
use ohlcvt_providers::provider::OhlcProvider;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    name = "ohlcvt",
    about = "Load and update OHLCVT candle tables from historical CSV files and the Kraken API"
)]
struct Cli {
    /// JSON configuration file (every key optional)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Root directory of historical CSV files (overrides config)
    #[arg(long)]
    historical_root: Option<PathBuf>,

    /// Pairs to process, e.g. XBT/USD,ETH/USD (overrides config)
    #[arg(short, long, value_delimiter = ',')]
    pairs: Option<Vec<Pair>>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop, recreate and backfill every table from historical files
    Init,

    /// Append candles newer than each table's latest timestamp
    Update {
        /// Intervals in minutes (comma-separated, defaults to the API intervals)
        #[arg(short, long, value_delimiter = ',')]
        intervals: Option<Vec<Interval>>,

        /// Maximum pages fetched per table
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Initial load when the database does not exist yet, then update.
    ///
    /// An existing database is never reloaded unless --force-init is given,
    /// so a pair whose earlier init failed stays without history until then.
    Run {
        /// Maximum pages fetched per table
        #[arg(long)]
        max_pages: Option<u32>,

        /// Run the initial load even when the database already exists
        #[arg(long)]
        force_init: bool,
    },

    /// Show row counts and timestamp ranges per table
    Status {
        /// Filter by pair (shows all tables if omitted)
        #[arg(short, long)]
        pair: Option<Pair>,
    },

    /// Check tables for out-of-order timestamps and zero-volume rows
    Validate {
        /// Filter by pair (validates all tables if omitted)
        #[arg(short, long)]
        pair: Option<Pair>,
    },
}

fn load_config(cli: &Cli) -> Result<LoaderConfig> {
    let mut config = match &cli.config {
        Some(path) => LoaderConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => LoaderConfig::default(),
    };

    if let Some(db) = &cli.db {
        config.store_path = db.clone();
    }
    if let Some(root) = &cli.historical_root {
        config.historical_root = root.clone();
    }
    if let Some(pairs) = &cli.pairs {
        config.pairs = pairs.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Tables belonging to `pair`, or every table when no filter is given.
fn select_tables(store: &CandleStore, pair: Option<&Pair>) -> Result<Vec<String>> {
    let tables = store.list_tables().context("failed to list tables")?;
    Ok(match pair {
        Some(pair) => {
            let prefix = format!("{}_", pair.code());
            tables
                .into_iter()
                .filter(|t| t.starts_with(&prefix))
                .collect()
        }
        None => tables,
    })
}

/// Configured pairs with no table in the store.
fn pairs_without_tables<'a>(
    store: &CandleStore,
    config: &'a LoaderConfig,
) -> Result<Vec<&'a Pair>> {
    let mut missing = Vec::new();
    for pair in &config.pairs {
        if select_tables(store, Some(pair))?.is_empty() {
            missing.push(pair);
        }
    }
    Ok(missing)
}

fn cmd_init(store: &CandleStore, config: &LoaderConfig) -> Result<()> {
    let report = batch_initial_load(store, config);

    for (pair, summary) in report.succeeded() {
        info!(
            "{pair}: {} table(s) created, {} historical row(s) loaded",
            summary.tables.len(),
            summary.historical_rows()
        );
    }

    let failed: Vec<&str> = report.failed().map(|(pair, _)| pair).collect();
    if !failed.is_empty() {
        anyhow::bail!("initial load failed for: {}", failed.join(", "));
    }
    Ok(())
}

async fn cmd_update(
    provider: &dyn OhlcProvider,
    store: &CandleStore,
    config: &LoaderConfig,
    intervals: Option<&[Interval]>,
) -> Result<()> {
    info!("Using provider: {}", provider.name());

    let report = match intervals {
        Some(intervals) => {
            let mut report = BatchReport::default();
            for pair in &config.pairs {
                report.extend(
                    batch_incremental_load(
                        provider,
                        store,
                        pair,
                        intervals.iter().copied(),
                        config.max_pages,
                    )
                    .await,
                );
            }
            report
        }
        None => incremental_load_all(provider, store, config).await,
    };

    summarize_update(&report)?;
    Ok(())
}

/// Log the totals of an update run and return the number of appended candles.
/// Tables that stopped early still count what they committed.
fn summarize_update(report: &BatchReport<FetchOutcome>) -> Result<usize> {
    let appended: usize = report.succeeded().map(|(_, o)| o.appended).sum();
    let failed: Vec<&str> = report.failed().map(|(table, _)| table).collect();
    let truncated: Vec<&str> = report
        .succeeded()
        .filter(|(_, o)| !o.is_complete())
        .map(|(table, _)| table)
        .collect();
    info!(
        "update finished: {appended} candle(s) appended, {} table(s), {} failed, {} incomplete",
        report.outcomes.len(),
        failed.len(),
        truncated.len()
    );
    if !truncated.is_empty() {
        warn!(
            "stopped early for {}; the next update continues from their latest candle",
            truncated.join(", ")
        );
    }

    if !failed.is_empty() {
        for (table, e) in report.failed() {
            error!("{table}: [{}] {e}", e.kind());
        }
        anyhow::bail!(
            "{} of {} table(s) failed to update: {}",
            failed.len(),
            report.outcomes.len(),
            failed.join(", ")
        );
    }
    Ok(appended)
}

fn cmd_status(store: &CandleStore, pair: Option<&Pair>) -> Result<()> {
    let tables = select_tables(store, pair)?;

    if tables.is_empty() {
        println!("No tables in store.");
        return Ok(());
    }

    for table in &tables {
        let rows = store
            .row_count(table)
            .with_context(|| format!("failed to count rows in {table}"))?;
        match store
            .timestamp_span(table)
            .with_context(|| format!("failed to read timestamps of {table}"))?
        {
            Some((first, last)) => println!(
                "{table}: {rows} row(s), {} to {}",
                format_timestamp(first),
                format_timestamp(last)
            ),
            None => println!("{table}: empty"),
        }
    }

    Ok(())
}

fn cmd_validate(store: &CandleStore, pair: Option<&Pair>) -> Result<()> {
    let tables = select_tables(store, pair)?;

    if tables.is_empty() {
        println!("No tables to validate.");
        return Ok(());
    }

    let mut issues = 0;

    for table in &tables {
        let candles = match store.read_rows(table) {
            Ok(candles) => candles,
            Err(e) => {
                println!("ERROR: {table}: failed to read: {e}");
                issues += 1;
                continue;
            }
        };

        if candles.is_empty() {
            println!("WARN: {table}: empty table");
            issues += 1;
            continue;
        }

        // Check timestamp ordering
        for i in 1..candles.len() {
            if candles[i].timestamp <= candles[i - 1].timestamp {
                println!("WARN: {table}: timestamps not strictly ascending at row {i}");
                issues += 1;
                break;
            }
        }

        // Check volume
        let zero_volume = candles.iter().filter(|c| c.volume == 0.0).count();
        if zero_volume > 0 {
            println!("WARN: {table}: {zero_volume} candle(s) with zero volume");
            issues += 1;
        }
    }

    if issues == 0 {
        println!("All tables valid.");
    } else {
        println!("{issues} issue(s) found.");
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let mut config = load_config(&cli)?;
    let store = CandleStore::new(&config.store_path);
    let provider = KrakenProvider::new();

    match &cli.command {
        Commands::Init => {
            cmd_init(&store, &config)?;
        }
        Commands::Update {
            intervals,
            max_pages,
        } => {
            if let Some(max_pages) = max_pages {
                config.max_pages = *max_pages;
            }
            cmd_update(&provider, &store, &config, intervals.as_deref()).await?;
        }
        Commands::Run {
            max_pages,
            force_init,
        } => {
            if let Some(max_pages) = max_pages {
                config.max_pages = *max_pages;
            }
            if *force_init {
                info!("--force-init given, running initial load");
                cmd_init(&store, &config)?;
            } else if store.exists() {
                info!(
                    "{} exists, skipping initial load",
                    store.path().display()
                );
                let missing = pairs_without_tables(&store, &config)?;
                if !missing.is_empty() {
                    let missing: Vec<String> = missing.iter().map(|p| p.to_string()).collect();
                    warn!(
                        "no tables for {}; rerun with --force-init to load their history",
                        missing.join(", ")
                    );
                }
            } else {
                warn!(
                    "{} not found, running initial load first",
                    store.path().display()
                );
                cmd_init(&store, &config)?;
            }
            cmd_update(&provider, &store, &config, None).await?;
        }
        Commands::Status { pair } => {
            cmd_status(&store, pair.as_ref())?;
        }
        Commands::Validate { pair } => {
            cmd_validate(&store, pair.as_ref())?;
        }
    }

    Ok(())
}
