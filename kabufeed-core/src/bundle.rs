//! Ingestion adapter and external sink contracts.
//!
//! The consuming framework owns four writer capabilities (asset metadata,
//! minute bars, daily bars, corporate-action adjustments). `Bundle` drives
//! the catalog → series → metadata pipeline and hands each stage's output
//! to those sinks in the shapes they expect. Data flows strictly forward;
//! nothing reads back from a sink, and a failure anywhere aborts the run
//! before the metadata write — rows already handed to a sink are the
//! sink's problem, there is no rollback here.

use crate::catalog::{Catalog, CatalogError};
use crate::config::{self, ConfigError};
use crate::metadata::{exchange_frame, MetaRow, MetadataBuilder, MetadataError};
use crate::series::{SeriesError, SeriesReader};
use crate::store::{StoreError, TableStore};
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Store key of the splits table, passed through to the adjustments sink
/// verbatim.
pub const SPLITS_KEY: &str = "jp/splits";

/// Bar interval of a bundle. Only daily bundles exist; the value rides
/// along for the framework's benefit and is otherwise unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarInterval {
    #[default]
    Daily,
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarInterval::Daily => write!(f, "1d"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("asset db sink: {0}")]
    AssetDb(String),

    #[error("daily bar sink: {0}")]
    DailyBars(String),

    #[error("minute bar sink: {0}")]
    MinuteBars(String),

    #[error("adjustment sink: {0}")]
    Adjustments(String),
}

/// Asset-metadata sink: receives the pruned equities table and the one-row
/// exchange descriptor table.
pub trait AssetDbWriter {
    fn write(&mut self, equities: DataFrame, exchanges: DataFrame) -> Result<(), SinkError>;
}

/// Daily-bar sink: pulls `(sid, bars)` pairs from the stream at its own
/// pace. The stream is single-pass; it ends early if a series fails to
/// load, and the adapter surfaces that failure after the write returns.
pub trait DailyBarWriter {
    fn write(
        &mut self,
        bars: &mut dyn Iterator<Item = (u32, DataFrame)>,
        show_progress: bool,
    ) -> Result<(), SinkError>;
}

/// Minute-bar sink. Part of the framework contract, accepted for parity —
/// a daily bundle never drives it.
pub trait MinuteBarWriter {
    fn write(
        &mut self,
        bars: &mut dyn Iterator<Item = (u32, DataFrame)>,
        show_progress: bool,
    ) -> Result<(), SinkError>;
}

/// Corporate-actions sink: receives the splits table unmodified.
pub trait AdjustmentWriter {
    fn write(&mut self, splits: DataFrame) -> Result<(), SinkError>;
}

/// The framework's writer objects for one ingestion run.
pub struct Sinks<'a> {
    pub asset_db: &'a mut dyn AssetDbWriter,
    pub minute_bars: Option<&'a mut dyn MinuteBarWriter>,
    pub daily_bars: &'a mut dyn DailyBarWriter,
    pub adjustments: &'a mut dyn AdjustmentWriter,
}

/// Session parameters the framework passes alongside its sinks. Carried
/// through, not interpreted here.
#[derive(Debug, Clone)]
pub struct IngestSession {
    pub calendar: String,
    pub start_session: Option<NaiveDate>,
    pub end_session: Option<NaiveDate>,
    pub output_dir: PathBuf,
    pub show_progress: bool,
}

impl Default for IngestSession {
    fn default() -> Self {
        Self {
            calendar: crate::metadata::EXCHANGE.to_string(),
            start_session: None,
            end_session: None,
            output_dir: PathBuf::from("."),
            show_progress: false,
        }
    }
}

/// Per-run progress callbacks.
pub trait IngestProgress {
    /// Called as each instrument's series is handed to the bar sink.
    fn on_series(&self, sid: u32, symbol: &str, index: usize, total: usize);

    /// Called once after the metadata and adjustments writes.
    fn on_ingest_complete(&self, written: usize, pruned: usize, total: usize);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl IngestProgress for StdoutProgress {
    fn on_series(&self, sid: u32, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] {symbol} (sid {sid})", index + 1, total);
    }

    fn on_ingest_complete(&self, written: usize, pruned: usize, total: usize) {
        println!("\nIngest complete: {written}/{total} series written, {pruned} metadata row(s) pruned");
    }
}

/// Progress reporter that says nothing.
pub struct SilentProgress;

impl IngestProgress for SilentProgress {
    fn on_series(&self, _sid: u32, _symbol: &str, _index: usize, _total: usize) {}
    fn on_ingest_complete(&self, _written: usize, _pruned: usize, _total: usize) {}
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("series: {0}")]
    Series(#[from] SeriesError),

    #[error("metadata: {0}")]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// What one completed ingestion run wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub catalog_len: usize,
    pub series_written: usize,
    pub metadata_rows: usize,
    pub pruned_rows: usize,
    pub splits_rows: usize,
}

/// The ingestion adapter.
pub struct Bundle {
    interval: BarInterval,
}

impl Bundle {
    pub fn new(interval: BarInterval) -> Self {
        Self { interval }
    }

    /// A daily bundle — the only kind there is.
    pub fn daily() -> Self {
        Self::new(BarInterval::Daily)
    }

    pub fn interval(&self) -> BarInterval {
        self.interval
    }

    /// Resolve the store root from the environment and ingest. The config
    /// check runs before the store is touched, so a missing variable never
    /// reaches the sinks.
    pub fn ingest_from_env(
        &self,
        sinks: &mut Sinks<'_>,
        session: &IngestSession,
        progress: &dyn IngestProgress,
    ) -> Result<IngestReport, IngestError> {
        let root = config::store_root()?;
        let store = TableStore::open(root)?;
        self.ingest(&store, sinks, session, progress)
    }

    /// Drive one full ingestion run against an open store.
    pub fn ingest(
        &self,
        store: &TableStore,
        sinks: &mut Sinks<'_>,
        session: &IngestSession,
        progress: &dyn IngestProgress,
    ) -> Result<IngestReport, IngestError> {
        let catalog = Catalog::load(store)?;
        let total = catalog.len();
        let mut builder = MetadataBuilder::for_catalog(&catalog);

        let (write_result, failure) = {
            let mut stream = BarStream {
                reader: SeriesReader::new(store, &catalog),
                builder: &mut builder,
                progress,
                index: 0,
                total,
                failure: None,
            };
            let write_result = sinks.daily_bars.write(&mut stream, session.show_progress);
            (write_result, stream.failure)
        };
        // A series failure is the root cause even if the sink also errored
        // on the truncated stream.
        if let Some(e) = failure {
            return Err(e);
        }
        write_result?;

        let series_written = builder.filled();
        let (equities, pruned_rows) = builder.finish()?;
        let metadata_rows = equities.height();
        sinks.asset_db.write(equities, exchange_frame()?)?;

        let splits = store.read(SPLITS_KEY)?;
        let splits_rows = splits.height();
        sinks.adjustments.write(splits)?;

        progress.on_ingest_complete(series_written, pruned_rows, total);

        Ok(IngestReport {
            catalog_len: total,
            series_written,
            metadata_rows,
            pruned_rows,
            splits_rows,
        })
    }
}

/// The daily-bar stream: drains the series reader, records each record's
/// scalar facts into the metadata builder, yields `(sid, bars)` to the
/// sink. On a load failure it stops and parks the error for the adapter.
struct BarStream<'a> {
    reader: SeriesReader<'a>,
    builder: &'a mut MetadataBuilder,
    progress: &'a dyn IngestProgress,
    index: usize,
    total: usize,
    failure: Option<IngestError>,
}

impl Iterator for BarStream<'_> {
    type Item = (u32, DataFrame);

    fn next(&mut self) -> Option<Self::Item> {
        if self.failure.is_some() {
            return None;
        }
        match self.reader.next()? {
            Ok(series) => {
                self.progress
                    .on_series(series.sid, &series.symbol, self.index, self.total);
                self.index += 1;
                if let Err(e) = self.builder.fill(series.sid, MetaRow::from(&series)) {
                    self.failure = Some(e.into());
                    return None;
                }
                Some((series.sid, series.bars))
            }
            Err(e) => {
                self.failure = Some(e.into());
                None
            }
        }
    }
}
