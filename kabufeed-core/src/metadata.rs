//! Asset-metadata aggregation.
//!
//! One row per catalog entry, keyed by sid in an explicit map — the sid is
//! never used as a positional row index, so sparse or high-numbered sids
//! are fine. Rows start empty and are filled while the bar stream drains;
//! rows still missing a date when the stream is done are dropped before
//! the table reaches the asset-metadata sink.

use crate::catalog::Catalog;
use crate::series::EquitySeries;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;

/// Market identifier code for the Tokyo Stock Exchange.
pub const EXCHANGE: &str = "XTKS";
/// ISO country code for the exchange descriptor.
pub const COUNTRY_CODE: &str = "JP";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("sid {sid} is not in the catalog")]
    UnknownSid { sid: u32 },

    #[error("metadata frame: {0}")]
    Frame(#[from] PolarsError),
}

/// One instrument's metadata row.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaRow {
    pub symbol: String,
    pub asset_name: String,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub first_traded: NaiveDate,
    pub auto_close_date: NaiveDateTime,
    pub exchange: String,
}

impl From<&EquitySeries> for MetaRow {
    fn from(series: &EquitySeries) -> Self {
        Self {
            symbol: series.symbol.clone(),
            asset_name: series.asset_name.clone(),
            start_date: series.facts.start_date,
            end_date: series.facts.end_date,
            first_traded: series.facts.first_traded,
            auto_close_date: series.facts.auto_close_date,
            exchange: series.exchange.to_string(),
        }
    }
}

/// Collects metadata rows for every catalog entry.
pub struct MetadataBuilder {
    // sid → row slot; one slot per catalog entry, None until filled.
    slots: BTreeMap<u32, Option<MetaRow>>,
}

impl MetadataBuilder {
    /// Allocate one empty slot per catalog entry.
    pub fn for_catalog(catalog: &Catalog) -> Self {
        let slots = catalog.iter().map(|e| (e.sid, None)).collect();
        Self { slots }
    }

    /// Total slot count — equals the catalog length.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots that have been filled.
    pub fn filled(&self) -> usize {
        self.slots.values().filter(|s| s.is_some()).count()
    }

    /// Fill the slot for `sid`. The sid must exist in the catalog.
    pub fn fill(&mut self, sid: u32, row: MetaRow) -> Result<(), MetadataError> {
        match self.slots.get_mut(&sid) {
            Some(slot) => {
                *slot = Some(row);
                Ok(())
            }
            None => Err(MetadataError::UnknownSid { sid }),
        }
    }

    /// The full table, unpruned: exactly one row per catalog entry, with
    /// null dates for unfilled slots.
    pub fn to_frame(&self) -> Result<DataFrame, MetadataError> {
        frame_from_slots(self.slots.iter().map(|(sid, slot)| (*sid, slot.as_ref())))
    }

    /// The final table: unfilled slots dropped. Returns the pruned frame
    /// and how many rows were dropped.
    pub fn finish(self) -> Result<(DataFrame, usize), MetadataError> {
        let pruned = self.slots.values().filter(|s| s.is_none()).count();
        let frame = frame_from_slots(
            self.slots
                .iter()
                .filter(|(_, slot)| slot.is_some())
                .map(|(sid, slot)| (*sid, slot.as_ref())),
        )?;
        Ok((frame, pruned))
    }
}

fn frame_from_slots<'a>(
    slots: impl Iterator<Item = (u32, Option<&'a MetaRow>)>,
) -> Result<DataFrame, MetadataError> {
    let mut sids: Vec<u32> = Vec::new();
    let mut symbols: Vec<Option<String>> = Vec::new();
    let mut names: Vec<Option<String>> = Vec::new();
    let mut starts: Vec<Option<i64>> = Vec::new();
    let mut ends: Vec<Option<i64>> = Vec::new();
    let mut first_tradeds: Vec<Option<i64>> = Vec::new();
    let mut auto_closes: Vec<Option<i64>> = Vec::new();
    let mut exchanges: Vec<Option<String>> = Vec::new();

    for (sid, slot) in slots {
        sids.push(sid);
        match slot {
            Some(row) => {
                symbols.push(Some(row.symbol.clone()));
                names.push(Some(row.asset_name.clone()));
                starts.push(Some(naive_ms(row.start_date)));
                ends.push(Some(naive_ms(row.end_date)));
                first_tradeds.push(Some(naive_ms(row.first_traded.and_time(NaiveTime::MIN))));
                auto_closes.push(Some(naive_ms(row.auto_close_date)));
                exchanges.push(Some(row.exchange.clone()));
            }
            None => {
                symbols.push(None);
                names.push(None);
                starts.push(None);
                ends.push(None);
                first_tradeds.push(None);
                auto_closes.push(None);
                exchanges.push(None);
            }
        }
    }

    let datetime = DataType::Datetime(TimeUnit::Milliseconds, None);
    let frame = DataFrame::new(vec![
        Column::new("sid".into(), sids),
        Column::new("symbol".into(), symbols),
        Column::new("asset_name".into(), names),
        Column::new("start_date".into(), starts).cast(&datetime)?,
        Column::new("end_date".into(), ends).cast(&datetime)?,
        Column::new("first_traded".into(), first_tradeds).cast(&datetime)?,
        Column::new("auto_close_date".into(), auto_closes).cast(&datetime)?,
        Column::new("exchange".into(), exchanges),
    ])?;
    Ok(frame)
}

fn naive_ms(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

/// The one-row exchange descriptor table — a fixed literal, not derived
/// from data.
pub fn exchange_frame() -> Result<DataFrame, MetadataError> {
    let frame = df!(
        "exchange" => &[EXCHANGE],
        "canonical_name" => &[EXCHANGE],
        "country_code" => &[COUNTRY_CODE],
    )?;
    Ok(frame)
}
