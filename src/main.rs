//! Screencap harvester
//!
//! Walks the configured series listings, samples screencap galleries for
//! every episode that has none yet and keeps the episode catalog linked.
//!
//! **Usage:**
//! ```bash
//! screencap-harvester [--series SLUG]... [--force] [--dry-run] [harvest|relink|retries]
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use screencap_harvester::config::{ConfigBuilder, HarvestConfig, load_config};
use screencap_harvester::harvest::{Harvester, relink_store};
use screencap_harvester::logging::init_logging;
use screencap_harvester::store::{CatalogStore, JsonStore, MemoryStore};
use screencap_harvester::transport::HttpFetcher;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "screencap-harvester", version)]
#[command(about = "Harvest sampled episode screencaps into the local catalog")]
struct Args {
    /// JSON config file; defaults apply when it does not exist
    #[arg(long, value_name = "FILE", default_value = "harvester.json")]
    config: PathBuf,

    /// Episode reference catalog (must exist)
    #[arg(long, value_name = "FILE")]
    episodes: Option<PathBuf>,

    /// Screencaps catalog
    #[arg(long, value_name = "FILE")]
    screencaps: Option<PathBuf>,

    /// Pending-retry queue
    #[arg(long, value_name = "FILE")]
    retries: Option<PathBuf>,

    /// Only harvest these series (repeatable)
    #[arg(long = "series", value_name = "SLUG")]
    series: Vec<String>,

    /// Re-harvest episodes that already have screencaps
    #[arg(long, env = "SCREENCAP_FORCE_UPDATE")]
    force: bool,

    /// Run against an in-memory copy of the catalogs; nothing is written
    #[arg(long)]
    dry_run: bool,

    /// Seed for gallery sampling and pacing jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Also append log output to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Fetch listings and galleries (default)
    #[default]
    Harvest,
    /// Rebuild gallery references from the stored catalog, no network
    Relink,
    /// List episodes waiting to be retried
    Retries,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log_file.as_deref(), args.verbose)
        .context("failed to initialize logging")?;

    let base = load_config(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    let config = ConfigBuilder::new()
        .base(base)
        .episodes_path(args.episodes.as_ref())
        .screencaps_path(args.screencaps.as_ref())
        .retries_path(args.retries.as_ref())
        .only_series(args.series.clone())
        .force_update(args.force)
        .build()
        .context("invalid configuration")?;

    let store = JsonStore::new(config.paths.clone());
    store.check_inputs().context("required input missing")?;

    match args.command.unwrap_or_default() {
        Command::Harvest if args.dry_run => {
            info!("dry run: catalogs will not be written");
            let scratch = MemoryStore::snapshot_of(&store).context("failed to load catalogs")?;
            harvest(&config, &scratch, args.seed)
        }
        Command::Harvest => harvest(&config, &store, args.seed),
        Command::Relink if args.dry_run => {
            let scratch = MemoryStore::snapshot_of(&store).context("failed to load catalogs")?;
            let touched = relink_store(&scratch).context("relink failed")?;
            info!(touched, "dry run: references not written");
            Ok(())
        }
        Command::Relink => {
            relink_store(&store).context("relink failed")?;
            Ok(())
        }
        Command::Retries => {
            let queue = store.load_retries().context("failed to read retry queue")?;
            if queue.is_empty() {
                info!("no pending retries");
            }
            for retry in &queue.pending {
                info!(
                    episode = %retry.identity(),
                    failed_at = %retry.failed_at,
                    url = retry.url.as_deref().unwrap_or("-"),
                    reason = %retry.reason,
                    "pending retry"
                );
            }
            Ok(())
        }
    }
}

fn harvest<S: CatalogStore>(config: &HarvestConfig, store: &S, seed: Option<u64>) -> Result<()> {
    let fetcher = HttpFetcher::new(&config.transport).context("failed to build HTTP client")?;
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut harvester =
        Harvester::new(&fetcher, store, config, rng).context("failed to load catalogs")?;
    let report = harvester.run();

    info!(
        written = report.written,
        skipped = report.skipped_existing,
        empty = report.empty,
        unrecognized = report.unrecognized,
        failed = report.failed.len(),
        catalog = harvester.catalog().len(),
        "harvest complete"
    );
    for retry in &report.failed {
        warn!(episode = %retry.identity(), reason = %retry.reason, "will retry next run");
    }
    Ok(())
}
