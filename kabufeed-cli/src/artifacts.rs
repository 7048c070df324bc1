//! Local artifact sinks and the run manifest.
//!
//! These are reference implementations of the bundle sink contracts for
//! local runs: daily bars land as one parquet file per sid, the asset
//! metadata as CSV, the splits table as parquet, and a `manifest.json`
//! summarizes the run. The real framework supplies its own writers; these
//! exist so an ingestion can be inspected without it.

use anyhow::{Context, Result};
use chrono::DateTime;
use kabufeed_core::bundle::{
    AdjustmentWriter, AssetDbWriter, DailyBarWriter, IngestReport, SinkError,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Daily-bar sink: `{output_dir}/daily/{sid}.parquet`.
pub struct ParquetDailyBarSink {
    dir: PathBuf,
    pub written: usize,
}

impl ParquetDailyBarSink {
    pub fn new(output_dir: &Path) -> Result<Self, SinkError> {
        let dir = output_dir.join("daily");
        fs::create_dir_all(&dir).map_err(|e| SinkError::DailyBars(e.to_string()))?;
        Ok(Self { dir, written: 0 })
    }
}

impl DailyBarWriter for ParquetDailyBarSink {
    fn write(
        &mut self,
        bars: &mut dyn Iterator<Item = (u32, DataFrame)>,
        show_progress: bool,
    ) -> Result<(), SinkError> {
        for (sid, df) in bars {
            let path = self.dir.join(format!("{sid}.parquet"));
            let file =
                fs::File::create(&path).map_err(|e| SinkError::DailyBars(e.to_string()))?;
            ParquetWriter::new(file)
                .finish(&mut df.clone())
                .map_err(|e| SinkError::DailyBars(e.to_string()))?;
            self.written += 1;
            if show_progress {
                println!("  wrote {sid}.parquet ({} rows)", df.height());
            }
        }
        Ok(())
    }
}

/// Asset-metadata sink: `equities.csv` + `exchanges.csv`.
pub struct CsvAssetSink {
    dir: PathBuf,
    pub equities_path: Option<PathBuf>,
}

impl CsvAssetSink {
    pub fn new(output_dir: &Path) -> Result<Self, SinkError> {
        fs::create_dir_all(output_dir).map_err(|e| SinkError::AssetDb(e.to_string()))?;
        Ok(Self {
            dir: output_dir.to_path_buf(),
            equities_path: None,
        })
    }
}

impl AssetDbWriter for CsvAssetSink {
    fn write(&mut self, equities: DataFrame, exchanges: DataFrame) -> Result<(), SinkError> {
        let path = self.dir.join("equities.csv");
        write_equities_csv(&path, &equities).map_err(|e| SinkError::AssetDb(e.to_string()))?;
        self.equities_path = Some(path);

        write_exchanges_csv(&self.dir.join("exchanges.csv"), &exchanges)
            .map_err(|e| SinkError::AssetDb(e.to_string()))?;
        Ok(())
    }
}

fn write_equities_csv(path: &Path, equities: &DataFrame) -> Result<()> {
    let sids = equities.column("sid")?.u32()?;
    let symbols = equities.column("symbol")?.str()?;
    let names = equities.column("asset_name")?.str()?;
    let starts = equities.column("start_date")?.datetime()?;
    let ends = equities.column("end_date")?.datetime()?;
    let first_tradeds = equities.column("first_traded")?.datetime()?;
    let auto_closes = equities.column("auto_close_date")?.datetime()?;
    let exchanges = equities.column("exchange")?.str()?;

    let mut writer = csv::Writer::from_path(path).context("create equities.csv")?;
    writer.write_record([
        "sid",
        "symbol",
        "asset_name",
        "start_date",
        "end_date",
        "first_traded",
        "auto_close_date",
        "exchange",
    ])?;

    for row in 0..equities.height() {
        writer.write_record([
            sids.get(row).map(|v| v.to_string()).unwrap_or_default(),
            symbols.get(row).unwrap_or_default().to_string(),
            names.get(row).unwrap_or_default().to_string(),
            fmt_ms(starts.get(row)),
            fmt_ms(ends.get(row)),
            fmt_ms(first_tradeds.get(row)),
            fmt_ms(auto_closes.get(row)),
            exchanges.get(row).unwrap_or_default().to_string(),
        ])?;
    }
    writer.flush().context("flush equities.csv")?;
    Ok(())
}

fn write_exchanges_csv(path: &Path, exchanges: &DataFrame) -> Result<()> {
    let tags = exchanges.column("exchange")?.str()?;
    let canonical = exchanges.column("canonical_name")?.str()?;
    let countries = exchanges.column("country_code")?.str()?;

    let mut writer = csv::Writer::from_path(path).context("create exchanges.csv")?;
    writer.write_record(["exchange", "canonical_name", "country_code"])?;
    for row in 0..exchanges.height() {
        writer.write_record([
            tags.get(row).unwrap_or_default(),
            canonical.get(row).unwrap_or_default(),
            countries.get(row).unwrap_or_default(),
        ])?;
    }
    writer.flush().context("flush exchanges.csv")?;
    Ok(())
}

fn fmt_ms(ms: Option<i64>) -> String {
    ms.and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Adjustments sink: `splits.parquet`, written verbatim.
pub struct ParquetAdjustmentSink {
    dir: PathBuf,
    pub rows: usize,
}

impl ParquetAdjustmentSink {
    pub fn new(output_dir: &Path) -> Result<Self, SinkError> {
        fs::create_dir_all(output_dir).map_err(|e| SinkError::Adjustments(e.to_string()))?;
        Ok(Self {
            dir: output_dir.to_path_buf(),
            rows: 0,
        })
    }
}

impl AdjustmentWriter for ParquetAdjustmentSink {
    fn write(&mut self, splits: DataFrame) -> Result<(), SinkError> {
        self.rows = splits.height();
        let file = fs::File::create(self.dir.join("splits.parquet"))
            .map_err(|e| SinkError::Adjustments(e.to_string()))?;
        ParquetWriter::new(file)
            .finish(&mut splits.clone())
            .map_err(|e| SinkError::Adjustments(e.to_string()))?;
        Ok(())
    }
}

/// Run manifest export (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub store_root: String,
    pub interval: String,
    pub report: IngestReport,
    /// blake3 hash of the written equities.csv.
    pub equities_hash: Option<String>,
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest).context("serialize run manifest")?;
    fs::write(path, json).with_context(|| format!("write manifest to {}", path.display()))?;
    Ok(())
}

/// Hash an artifact file's contents.
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kabufeed_core::bundle::{Bundle, IngestSession, SilentProgress, Sinks};
    use kabufeed_core::demo::{seed_store, DEFAULT_SEED};
    use kabufeed_core::store::TableStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir(tag: &str) -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir =
            std::env::temp_dir().join(format!("kabufeed_cli_{tag}_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn ingest_into_artifact_sinks_writes_the_full_set() {
        let store_dir = temp_dir("store");
        seed_store(&store_dir, DEFAULT_SEED).unwrap();
        let out_dir = temp_dir("out");

        let mut daily = ParquetDailyBarSink::new(&out_dir).unwrap();
        let mut asset_db = CsvAssetSink::new(&out_dir).unwrap();
        let mut adjustments = ParquetAdjustmentSink::new(&out_dir).unwrap();

        let store = TableStore::open(&store_dir).unwrap();
        let report = {
            let mut sinks = Sinks {
                asset_db: &mut asset_db,
                minute_bars: None,
                daily_bars: &mut daily,
                adjustments: &mut adjustments,
            };
            Bundle::daily()
                .ingest(
                    &store,
                    &mut sinks,
                    &IngestSession::default(),
                    &SilentProgress,
                )
                .unwrap()
        };

        assert_eq!(daily.written, report.catalog_len);
        assert!(out_dir.join("daily/7203.parquet").is_file());
        assert!(out_dir.join("equities.csv").is_file());
        assert!(out_dir.join("exchanges.csv").is_file());
        assert!(out_dir.join("splits.parquet").is_file());

        let equities_csv = fs::read_to_string(out_dir.join("equities.csv")).unwrap();
        assert!(equities_csv.contains("7203.JP"));
        assert!(equities_csv.contains("XTKS"));
        // Header plus one line per metadata row.
        assert_eq!(equities_csv.lines().count(), report.metadata_rows + 1);

        let _ = fs::remove_dir_all(&store_dir);
        let _ = fs::remove_dir_all(&out_dir);
    }

    #[test]
    fn manifest_roundtrips_through_json() {
        let dir = temp_dir("manifest");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("manifest.json");

        let manifest = RunManifest {
            timestamp: chrono::Utc::now(),
            store_root: "/tmp/kabufeed/custom_data".into(),
            interval: "1d".into(),
            report: IngestReport {
                catalog_len: 8,
                series_written: 8,
                metadata_rows: 8,
                pruned_rows: 0,
                splits_rows: 0,
            },
            equities_hash: Some("abc".into()),
        };
        write_manifest(&path, &manifest).unwrap();

        let parsed: RunManifest =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.report.catalog_len, 8);
        assert_eq!(parsed.interval, "1d");

        let _ = fs::remove_dir_all(&dir);
    }
}
