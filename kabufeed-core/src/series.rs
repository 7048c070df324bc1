//! Per-instrument series loading and time-index normalization.
//!
//! Each catalog entry has one daily series table under `jp/{sid}`. The
//! loader normalizes the `date` column to naive civil time (one uniform
//! representation, no timezone offset), derives the four scalar date facts
//! the metadata table needs, and yields the extended per-instrument record
//! as a pull-driven, single-pass iterator — the series themselves are never
//! materialized as a whole set.

use crate::catalog::{Catalog, CatalogEntry};
use crate::metadata::EXCHANGE;
use crate::store::{StoreError, TableStore};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;

/// Name of the time index column in series tables.
pub const DATE_COL: &str = "date";

/// Store key of one instrument's series table.
pub fn series_key(sid: u32) -> String {
    format!("jp/{sid}")
}

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("no series table for sid {sid} (key '{key}')")]
    NotFound { sid: u32, key: String },

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("time index: {0}")]
    Shape(String),
}

/// Scalar date facts derived from a normalized series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesFacts {
    /// First index value.
    pub start_date: NaiveDateTime,
    /// Last index value.
    pub end_date: NaiveDateTime,
    /// `start_date` truncated to a calendar date, no time component.
    pub first_traded: NaiveDate,
    /// One day past the last observation; the instrument counts as
    /// delisted for simulation purposes after this.
    pub auto_close_date: NaiveDateTime,
}

/// The extended per-instrument record the daily-bar stream is built from.
#[derive(Debug, Clone)]
pub struct EquitySeries {
    pub sid: u32,
    pub symbol: String,
    pub asset_name: String,
    /// Normalized bars, time index strictly increasing, naive datetimes.
    pub bars: DataFrame,
    pub facts: SeriesFacts,
    pub exchange: &'static str,
}

fn naive_ms() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

/// Coerce a series' `date` column to naive `Datetime(ms)`.
///
/// Idempotent: an already-naive index passes through untouched. Timezone
/// aware indexes keep their local wall time. String indexes are parsed;
/// anything unparseable is a shape error.
pub fn normalize_time_index(df: DataFrame) -> Result<DataFrame, SeriesError> {
    let dtype = df
        .column(DATE_COL)
        .map_err(|_| SeriesError::Shape(format!("missing '{DATE_COL}' column")))?
        .dtype()
        .clone();

    match dtype {
        DataType::Datetime(TimeUnit::Milliseconds, None) => Ok(df),
        DataType::Datetime(_, None) | DataType::Date => {
            collect(df.lazy().with_column(col(DATE_COL).cast(naive_ms())))
        }
        DataType::Datetime(_, Some(_)) => collect(
            df.lazy().with_column(
                col(DATE_COL)
                    .dt()
                    .replace_time_zone(None, lit("raise"), NonExistent::Raise)
                    .cast(naive_ms()),
            ),
        ),
        DataType::String => collect(df.lazy().with_column(col(DATE_COL).str().to_datetime(
            Some(TimeUnit::Milliseconds),
            None,
            StrptimeOptions::default(),
            lit("raise"),
        ))),
        other => Err(SeriesError::Shape(format!(
            "unsupported time index dtype: {other:?}"
        ))),
    }
}

fn collect(lf: LazyFrame) -> Result<DataFrame, SeriesError> {
    lf.collect().map_err(|e| SeriesError::Shape(e.to_string()))
}

/// Derive the scalar date facts from a normalized series.
///
/// Also enforces the index invariant: non-null and strictly increasing.
pub fn derive_facts(df: &DataFrame) -> Result<SeriesFacts, SeriesError> {
    let ca = df
        .column(DATE_COL)
        .map_err(|e| SeriesError::Shape(e.to_string()))?
        .datetime()
        .map_err(|e| SeriesError::Shape(e.to_string()))?;

    let mut first_ms: Option<i64> = None;
    let mut prev_ms: Option<i64> = None;
    for row in 0..ca.len() {
        let ms = ca
            .get(row)
            .ok_or_else(|| SeriesError::Shape(format!("null timestamp at row {row}")))?;
        if let Some(prev) = prev_ms {
            if ms <= prev {
                return Err(SeriesError::Shape(format!(
                    "time index not strictly increasing at row {row}"
                )));
            }
        }
        if first_ms.is_none() {
            first_ms = Some(ms);
        }
        prev_ms = Some(ms);
    }

    let (Some(first), Some(last)) = (first_ms, prev_ms) else {
        return Err(SeriesError::Shape("empty time index".into()));
    };

    let start_date = ms_to_naive(first)?;
    let end_date = ms_to_naive(last)?;
    Ok(SeriesFacts {
        start_date,
        end_date,
        first_traded: start_date.date(),
        auto_close_date: end_date + Duration::days(1),
    })
}

fn ms_to_naive(ms: i64) -> Result<NaiveDateTime, SeriesError> {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| SeriesError::Shape(format!("timestamp {ms} out of range")))
}

/// Lazy, finite, single-pass reader over every catalog entry, in catalog
/// order. Not restartable; build a new one for a new pass.
pub struct SeriesReader<'a> {
    store: &'a TableStore,
    entries: std::slice::Iter<'a, CatalogEntry>,
}

impl<'a> SeriesReader<'a> {
    pub fn new(store: &'a TableStore, catalog: &'a Catalog) -> Self {
        Self {
            store,
            entries: catalog.iter(),
        }
    }

    fn load(&self, entry: &CatalogEntry) -> Result<EquitySeries, SeriesError> {
        let key = series_key(entry.sid);
        let raw = match self.store.read(&key) {
            Ok(df) => df,
            // A catalog entry with no series aborts the run; never swallowed.
            Err(StoreError::TableNotFound { .. }) => {
                return Err(SeriesError::NotFound {
                    sid: entry.sid,
                    key,
                })
            }
            Err(e) => return Err(SeriesError::Store(e)),
        };
        let bars = normalize_time_index(raw)?;
        let facts = derive_facts(&bars)?;
        Ok(EquitySeries {
            sid: entry.sid,
            symbol: entry.symbol.clone(),
            asset_name: entry.asset_name.clone(),
            bars,
            facts,
            exchange: EXCHANGE,
        })
    }
}

impl Iterator for SeriesReader<'_> {
    type Item = Result<EquitySeries, SeriesError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        Some(self.load(entry))
    }
}
