//! Tickvault CLI: historical fetch with archival, plus vendor metadata.
//!
//! Commands:
//! - `fetch`: fetch a universe from a vendor, optionally archiving it
//! - `exchanges`: list a vendor's exchanges, snapshot to JSON
//! - `symbols`: list an exchange's tickers, snapshot to JSON
//! - `search`: free-text instrument search

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tickvault_core::config::{AppConfig, Credentials};
use tickvault_core::fetch::HttpConnector;
use tickvault_core::query::{SortOrder, Timespan};
use tickvault_core::universe::UniverseSet;
use tickvault_core::vendor::{EodhdVendor, PolygonAssetClass, PolygonVendor};
use tickvault_core::{metadata, HistoricalLoader, MarketDataVendor, TimeSeriesQuery, VendorKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tickvault",
    about = "Fetch, normalize and archive historical market data"
)]
struct Cli {
    /// Log filter, e.g. `debug` or `tickvault_core=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch historical data for a universe.
    Fetch {
        /// Universe name from the universe file.
        #[arg(long)]
        universe: String,

        /// Vendor: EODHD or Polygon.
        #[arg(long)]
        vendor: VendorKind,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,

        /// Exchange code, e.g. US.
        #[arg(long, default_value = "")]
        exchange: String,

        /// Bar size: minute, hour, day, week, month, quarter, year.
        #[arg(long, default_value = "day")]
        timespan: Timespan,

        #[arg(long, default_value_t = 1)]
        multiplier: u32,

        /// Request split-adjusted prices.
        #[arg(long, default_value_t = false)]
        adjusted: bool,

        /// asc or desc.
        #[arg(long, default_value = "asc")]
        sort: SortOrder,

        /// Polygon asset class: stocks, options, crypto.
        #[arg(long, default_value = "stocks")]
        asset_class: PolygonAssetClass,

        /// Merge the result into the on-disk archive.
        #[arg(long, default_value_t = false)]
        archive: bool,

        /// Archive directory. Overrides `output_dir` from the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List the exchanges a vendor supports.
    Exchanges {
        #[arg(long)]
        vendor: VendorKind,

        #[arg(long, default_value = "stocks")]
        asset_class: PolygonAssetClass,

        /// Snapshot directory. Overrides `output_dir` from the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List the tickers of one exchange.
    Symbols {
        #[arg(long)]
        vendor: VendorKind,

        #[arg(long)]
        exchange: String,

        #[arg(long, default_value = "stocks")]
        asset_class: PolygonAssetClass,

        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Search instruments by name or ticker.
    Search {
        #[arg(long)]
        vendor: VendorKind,

        query: String,

        #[arg(long, default_value_t = 15)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Fetch {
            universe,
            vendor,
            start,
            end,
            exchange,
            timespan,
            multiplier,
            adjusted,
            sort,
            asset_class,
            archive,
            output_dir,
        } => {
            let universes = UniverseSet::from_file(&config.universe_file)?;
            let query = TimeSeriesQuery::new(universes.get_universe(&universe)?, start, end)?
                .with_exchange(exchange)
                .with_timespan(timespan, multiplier)
                .with_split_adjusted(adjusted)
                .with_sort(sort);
            run_fetch(&config, vendor, asset_class, &query, archive, output_dir)
        }
        Commands::Exchanges {
            vendor,
            asset_class,
            output_dir,
        } => {
            let vendor = build_vendor(&config, vendor, asset_class)?;
            let dir = output_dir.or_else(|| config.output_dir.clone());
            let exchanges = metadata::get_exchanges(vendor.as_ref(), dir.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&exchanges)?);
            Ok(())
        }
        Commands::Symbols {
            vendor,
            exchange,
            asset_class,
            output_dir,
        } => {
            let vendor = build_vendor(&config, vendor, asset_class)?;
            let dir = output_dir.or_else(|| config.output_dir.clone());
            let tickers = metadata::get_symbols_from_exchange(vendor.as_ref(), &exchange, dir.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&tickers)?);
            Ok(())
        }
        Commands::Search {
            vendor,
            query,
            limit,
        } => {
            let vendor = build_vendor(&config, vendor, PolygonAssetClass::default())?;
            let hits = vendor.search(&query, limit)?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
            Ok(())
        }
    }
}

/// Install the global subscriber. `--log-level` wins over `RUST_LOG`;
/// without either, `info`.
fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid --log-level '{directive}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn build_vendor(
    config: &AppConfig,
    kind: VendorKind,
    asset_class: PolygonAssetClass,
) -> Result<Box<dyn MarketDataVendor>> {
    let timeout = config.request_timeout();
    let connector = Arc::new(HttpConnector::new(timeout));
    let credentials = Credentials::from_env(kind)?;
    info!("API key for {kind} is loaded");

    let vendor: Box<dyn MarketDataVendor> = match kind {
        VendorKind::Eodhd => Box::new(
            EodhdVendor::new(credentials)
                .with_timeout(timeout)
                .with_retry(config.retry_policy())
                .with_connector(connector),
        ),
        VendorKind::Polygon => Box::new(
            PolygonVendor::new(credentials, asset_class)
                .with_timeout(timeout)
                .with_retry(config.retry_policy())
                .with_connector(connector),
        ),
    };
    Ok(vendor)
}

fn run_fetch(
    config: &AppConfig,
    kind: VendorKind,
    asset_class: PolygonAssetClass,
    query: &TimeSeriesQuery,
    archive: bool,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let vendor = build_vendor(config, kind, asset_class)?;
    let loader = HistoricalLoader::from_config(config)?
        .with_output_dir(output_dir.or_else(|| config.output_dir.clone()));

    // Single-threaded event loop for the network stage.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let data = runtime.block_on(loader.get_data(vendor.as_ref(), query, archive))?;

    println!(
        "Fetched {}/{} symbols of '{}' from {}",
        data.payloads.len(),
        query.symbols().len(),
        data.universe,
        data.vendor
    );
    if !data.missing.is_empty() {
        warn!("missing symbols: {}", data.missing.join(", "));
    }
    if !data.rejected.is_empty() {
        warn!("symbols not archived: {}", data.rejected.join(", "));
    }
    if let Some(summary) = &data.archive {
        println!(
            "Archived to {}: {} rows written, {} already stored",
            summary.path.display(),
            summary.rows_written(),
            summary.rows_dropped()
        );
    }

    // Per-symbol failures never fail the run, even when none succeed.
    if data.payloads.is_empty() && !query.symbols().is_empty() {
        warn!("no symbol could be fetched");
    }
    Ok(())
}
