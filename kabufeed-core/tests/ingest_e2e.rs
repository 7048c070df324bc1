//! End-to-end run over a seeded demo store.

use polars::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use kabufeed_core::bundle::{
    AdjustmentWriter, AssetDbWriter, Bundle, DailyBarWriter, IngestSession, SilentProgress,
    SinkError, Sinks,
};
use kabufeed_core::catalog::Catalog;
use kabufeed_core::demo::{demo_catalog, seed_store, DEFAULT_SEED};
use kabufeed_core::series::SeriesReader;
use kabufeed_core::store::TableStore;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn seeded_store_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("kabufeed_e2e_{}_{id}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    seed_store(&dir, DEFAULT_SEED).unwrap();
    dir
}

#[derive(Default)]
struct CapturingAssetDb {
    equities: Option<DataFrame>,
}

impl AssetDbWriter for CapturingAssetDb {
    fn write(&mut self, equities: DataFrame, _exchanges: DataFrame) -> Result<(), SinkError> {
        self.equities = Some(equities);
        Ok(())
    }
}

#[derive(Default)]
struct CountingDailyBars {
    sids: Vec<u32>,
}

impl DailyBarWriter for CountingDailyBars {
    fn write(
        &mut self,
        bars: &mut dyn Iterator<Item = (u32, DataFrame)>,
        _show_progress: bool,
    ) -> Result<(), SinkError> {
        self.sids.extend(bars.map(|(sid, _)| sid));
        Ok(())
    }
}

#[derive(Default)]
struct DroppingAdjustments;

impl AdjustmentWriter for DroppingAdjustments {
    fn write(&mut self, _splits: DataFrame) -> Result<(), SinkError> {
        Ok(())
    }
}

#[test]
fn reader_yields_one_record_per_entry_in_catalog_order() {
    let dir = seeded_store_dir();
    let store = TableStore::open(&dir).unwrap();
    let catalog = Catalog::load(&store).unwrap();

    let mut yielded = Vec::new();
    for result in SeriesReader::new(&store, &catalog) {
        let series = result.unwrap();
        assert_eq!(
            series.facts.auto_close_date,
            series.facts.end_date + chrono::Duration::days(1)
        );
        assert_eq!(series.facts.first_traded, series.facts.start_date.date());
        yielded.push(series.sid);
    }

    let expected: Vec<u32> = catalog.iter().map(|e| e.sid).collect();
    assert_eq!(yielded, expected);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn metadata_table_matches_the_catalog() {
    let dir = seeded_store_dir();
    let store = TableStore::open(&dir).unwrap();

    let mut asset_db = CapturingAssetDb::default();
    let mut daily = CountingDailyBars::default();
    let mut adjustments = DroppingAdjustments;

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

    assert_eq!(report.series_written, report.catalog_len);
    assert_eq!(daily.sids.len(), report.catalog_len);

    let equities = asset_db.equities.unwrap();
    assert_eq!(equities.height(), report.catalog_len);

    // Every catalog symbol shows up in the metadata table.
    let symbols = equities.column("symbol").unwrap();
    let symbols = symbols.str().unwrap();
    let mut got: Vec<String> = (0..symbols.len())
        .map(|i| symbols.get(i).unwrap().to_string())
        .collect();
    got.sort();
    let mut expected: Vec<String> = demo_catalog().iter().map(|e| e.symbol.clone()).collect();
    expected.sort();
    assert_eq!(got, expected);

    let _ = std::fs::remove_dir_all(&dir);
}
