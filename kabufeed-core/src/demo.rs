//! Synthetic demo store seeding.
//!
//! Builds a complete keyed store (catalog, one random-walk daily series per
//! sid, empty splits table) so the pipeline can be exercised without any
//! real market data. Deterministic: the per-symbol RNG is seeded from a
//! blake3 hash of the seed and symbol, so two seedings with the same seed
//! produce byte-identical tables.

use crate::bundle::SPLITS_KEY;
use crate::catalog::{CatalogEntry, EQUITIES_KEY};
use crate::schema::SplitsSchema;
use crate::series::{series_key, DATE_COL};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default RNG seed for demo data.
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame: {0}")]
    Frame(#[from] PolarsError),
}

/// What a seeding run wrote.
#[derive(Debug)]
pub struct SeedReport {
    pub instruments: usize,
    pub bar_rows: usize,
}

/// A small fixed catalog of Tokyo-listed names. Sids are the numeric
/// ticker codes — deliberately sparse and far from zero-based.
pub fn demo_catalog() -> Vec<CatalogEntry> {
    let names: [(u32, &str, &str); 8] = [
        (7203, "7203.JP", "TOYOTA MOTOR"),
        (6758, "6758.JP", "SONY GROUP"),
        (9984, "9984.JP", "SOFTBANK GROUP"),
        (6861, "6861.JP", "KEYENCE"),
        (8306, "8306.JP", "MITSUBISHI UFJ FINANCIAL"),
        (7974, "7974.JP", "NINTENDO"),
        (9432, "9432.JP", "NIPPON TELEGRAPH & TELEPHONE"),
        (4502, "4502.JP", "TAKEDA PHARMACEUTICAL"),
    ];
    names
        .into_iter()
        .map(|(sid, symbol, asset_name)| CatalogEntry {
            sid,
            symbol: symbol.to_string(),
            asset_name: asset_name.to_string(),
        })
        .collect()
}

/// Seed a full demo store at `root`.
///
/// Listing dates are staggered so the instruments have different
/// start/end spans; every series ends on the same final session.
pub fn seed_store(root: &Path, seed: u64) -> Result<SeedReport, SeedError> {
    fs::create_dir_all(root.join("jp"))?;

    let catalog = demo_catalog();
    let catalog_df = DataFrame::new(vec![
        Column::new(
            "sid".into(),
            catalog.iter().map(|e| e.sid).collect::<Vec<u32>>(),
        ),
        Column::new(
            "symbol".into(),
            catalog
                .iter()
                .map(|e| e.symbol.clone())
                .collect::<Vec<String>>(),
        ),
        Column::new(
            "asset_name".into(),
            catalog
                .iter()
                .map(|e| e.asset_name.clone())
                .collect::<Vec<String>>(),
        ),
    ])?;
    write_table(root, EQUITIES_KEY, &catalog_df)?;

    let end = NaiveDate::from_ymd_opt(2024, 12, 30).expect("valid date");
    let mut bar_rows = 0;
    for (i, entry) in catalog.iter().enumerate() {
        let start = NaiveDate::from_ymd_opt(2018, 1, 4).expect("valid date")
            + Duration::days(180 * i as i64);
        let series = random_walk_frame(&entry.symbol, seed, start, end)?;
        bar_rows += series.height();
        write_table(root, &series_key(entry.sid), &series)?;
    }

    write_table(root, SPLITS_KEY, &SplitsSchema::empty_frame())?;

    Ok(SeedReport {
        instruments: catalog.len(),
        bar_rows,
    })
}

/// Random-walk daily bars from a starting price of 100.0, weekdays only.
fn random_walk_frame(
    symbol: &str,
    seed: u64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<DataFrame, SeedError> {
    let hash = blake3::hash(format!("{seed}:{symbol}").as_bytes());
    let mut rng = StdRng::from_seed(*hash.as_bytes());

    let mut dates_ms: Vec<i64> = Vec::new();
    let mut opens: Vec<f64> = Vec::new();
    let mut highs: Vec<f64> = Vec::new();
    let mut lows: Vec<f64> = Vec::new();
    let mut closes: Vec<f64> = Vec::new();
    let mut volumes: Vec<u64> = Vec::new();

    let mut price = 100.0_f64;
    let mut current = start;
    while current <= end {
        let weekday = current.weekday();
        if weekday == Weekday::Sat || weekday == Weekday::Sun {
            current += Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));

        dates_ms.push(
            current
                .and_time(NaiveTime::MIN)
                .and_utc()
                .timestamp_millis(),
        );
        opens.push(open);
        highs.push(high);
        lows.push(low);
        closes.push(close);
        volumes.push(rng.gen_range(500_000..5_000_000u64));

        price = close;
        current += Duration::days(1);
    }

    let frame = DataFrame::new(vec![
        Column::new(DATE_COL.into(), dates_ms)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])?;
    Ok(frame)
}

fn write_table(root: &Path, key: &str, df: &DataFrame) -> Result<(), SeedError> {
    let path = root.join(format!("{key}.parquet"));
    let file = fs::File::create(path)?;
    ParquetWriter::new(file).finish(&mut df.clone())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::schema::DailyBarSchema;
    use crate::series::SeriesReader;
    use crate::store::TableStore;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_store_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("kabufeed_demo_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn seeding_is_deterministic() {
        let a = random_walk_frame(
            "7203.JP",
            DEFAULT_SEED,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 29).unwrap(),
        )
        .unwrap();
        let b = random_walk_frame(
            "7203.JP",
            DEFAULT_SEED,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 29).unwrap(),
        )
        .unwrap();
        assert!(a.equals(&b));

        let other = random_walk_frame(
            "6758.JP",
            DEFAULT_SEED,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 29).unwrap(),
        )
        .unwrap();
        assert!(!other.equals(&a));
    }

    #[test]
    fn bars_match_the_expected_schema() {
        let df = random_walk_frame(
            "7203.JP",
            DEFAULT_SEED,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        DailyBarSchema::validate(&df).unwrap();
    }

    #[test]
    fn seeded_store_loads_end_to_end() {
        let dir = temp_store_dir();
        let report = seed_store(&dir, DEFAULT_SEED).unwrap();
        assert_eq!(report.instruments, 8);
        assert!(report.bar_rows > 0);

        let store = TableStore::open(&dir).unwrap();
        let catalog = Catalog::load(&store).unwrap();
        assert_eq!(catalog.len(), 8);

        let mut count = 0;
        for result in SeriesReader::new(&store, &catalog) {
            let series = result.unwrap();
            assert!(series.facts.start_date < series.facts.end_date);
            count += 1;
        }
        assert_eq!(count, 8);

        let _ = fs::remove_dir_all(&dir);
    }
}
