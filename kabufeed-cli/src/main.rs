//! kabufeed CLI — seed, inspect, and ingest a Japanese-equities bundle store.
//!
//! Commands:
//! - `seed` — build a synthetic demo store (catalog, per-sid daily series,
//!   empty splits table)
//! - `status` — report catalog size and per-instrument date ranges
//! - `ingest` — run the full pipeline into local artifact sinks
//!
//! The store root comes from `KABUFEED_ROOT` (the store lives in its
//! `custom_data` subdirectory); `--root` overrides it for local work.

mod artifacts;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use kabufeed_core::bundle::{Bundle, IngestSession, SilentProgress, Sinks, StdoutProgress};
use kabufeed_core::catalog::Catalog;
use kabufeed_core::config;
use kabufeed_core::demo::{seed_store, DEFAULT_SEED};
use kabufeed_core::schema::DailyBarSchema;
use kabufeed_core::series::SeriesReader;
use kabufeed_core::store::TableStore;

use artifacts::{
    hash_file, write_manifest, CsvAssetSink, ParquetAdjustmentSink, ParquetDailyBarSink,
    RunManifest,
};

#[derive(Parser)]
#[command(
    name = "kabufeed",
    about = "kabufeed CLI — Japanese-equities bundle normalization pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a synthetic demo store.
    Seed {
        /// Store root. Defaults to $KABUFEED_ROOT/custom_data.
        #[arg(long)]
        root: Option<PathBuf>,

        /// RNG seed for the demo data.
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Overwrite an existing store.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Report catalog size and per-instrument date ranges.
    Status {
        /// Store root. Defaults to $KABUFEED_ROOT/custom_data.
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Run a full ingestion into local artifact sinks.
    Ingest {
        /// Store root. Defaults to $KABUFEED_ROOT/custom_data.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Output directory for bar, metadata, and splits artifacts.
        #[arg(long, default_value = "bundle_out")]
        output_dir: PathBuf,

        /// Calendar tag recorded in the session.
        #[arg(long, default_value = "XTKS")]
        calendar: String,

        /// First session date (YYYY-MM-DD), recorded in the session.
        #[arg(long)]
        start: Option<String>,

        /// Last session date (YYYY-MM-DD), recorded in the session.
        #[arg(long)]
        end: Option<String>,

        /// Suppress per-instrument progress output.
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Seed { root, seed, force } => run_seed(root, seed, force),
        Commands::Status { root } => run_status(root),
        Commands::Ingest {
            root,
            output_dir,
            calendar,
            start,
            end,
            quiet,
        } => run_ingest(root, output_dir, calendar, start, end, quiet),
    }
}

/// `--root` wins; otherwise the environment decides. A missing variable is
/// reported as a configuration error before anything touches the disk.
fn resolve_root(flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(root) => Ok(root),
        None => Ok(config::store_root()?),
    }
}

fn run_seed(root: Option<PathBuf>, seed: u64, force: bool) -> Result<()> {
    let root = resolve_root(root)?;

    if root.join("jp/equities.parquet").is_file() && !force {
        bail!(
            "store at {} already has a catalog — pass --force to overwrite",
            root.display()
        );
    }

    let report = seed_store(&root, seed).context("seed demo store")?;
    println!(
        "Seeded {} instruments ({} bar rows) at {}",
        report.instruments,
        report.bar_rows,
        root.display()
    );
    Ok(())
}

fn run_status(root: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;
    let store = TableStore::open(&root)?;
    let catalog = Catalog::load(&store)?;

    println!("Store: {}", root.display());
    println!("Instruments: {}", catalog.len());
    println!();
    println!(
        "{:<6} {:<10} {:<30} {:>6} {:<25} {:<6}",
        "Sid", "Symbol", "Name", "Bars", "Date Range", "Schema"
    );
    println!("{}", "-".repeat(88));

    for result in SeriesReader::new(&store, &catalog) {
        let series = result?;
        let schema_ok = match DailyBarSchema::validate(&series.bars) {
            Ok(()) => "ok",
            Err(_) => "!",
        };
        let range = format!(
            "{} to {}",
            series.facts.start_date.date(),
            series.facts.end_date.date()
        );
        println!(
            "{:<6} {:<10} {:<30} {:>6} {:<25} {:<6}",
            series.sid,
            series.symbol,
            series.asset_name,
            series.bars.height(),
            range,
            schema_ok
        );
    }

    let splits = store.read(kabufeed_core::bundle::SPLITS_KEY)?;
    println!();
    println!("Splits rows: {}", splits.height());

    Ok(())
}

fn run_ingest(
    root: Option<PathBuf>,
    output_dir: PathBuf,
    calendar: String,
    start: Option<String>,
    end: Option<String>,
    quiet: bool,
) -> Result<()> {
    let root = resolve_root(root)?;
    let store = TableStore::open(&root)?;

    let session = IngestSession {
        calendar,
        start_session: parse_date(start.as_deref())?,
        end_session: parse_date(end.as_deref())?,
        output_dir: output_dir.clone(),
        show_progress: !quiet,
    };

    let mut daily = ParquetDailyBarSink::new(&output_dir)?;
    let mut asset_db = CsvAssetSink::new(&output_dir)?;
    let mut adjustments = ParquetAdjustmentSink::new(&output_dir)?;

    let bundle = Bundle::daily();
    let report = {
        let mut sinks = Sinks {
            asset_db: &mut asset_db,
            minute_bars: None,
            daily_bars: &mut daily,
            adjustments: &mut adjustments,
        };
        if quiet {
            bundle.ingest(&store, &mut sinks, &session, &SilentProgress)?
        } else {
            bundle.ingest(&store, &mut sinks, &session, &StdoutProgress)?
        }
    };

    let equities_hash = match &asset_db.equities_path {
        Some(path) => Some(hash_file(path)?),
        None => None,
    };
    let manifest = RunManifest {
        timestamp: chrono::Utc::now(),
        store_root: root.display().to_string(),
        interval: bundle.interval().to_string(),
        report: report.clone(),
        equities_hash,
    };
    write_manifest(&output_dir.join("manifest.json"), &manifest)?;

    println!();
    println!("=== Ingest Result ===");
    println!("Catalog:        {}", report.catalog_len);
    println!("Series written: {}", report.series_written);
    println!("Metadata rows:  {}", report.metadata_rows);
    println!("Pruned rows:    {}", report.pruned_rows);
    println!("Splits rows:    {}", report.splits_rows);
    println!("Artifacts:      {}", output_dir.display());

    Ok(())
}

fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").context("date must be YYYY-MM-DD"))
        .transpose()
}
