//! Equity catalog — the fixed list of tradable instruments.
//!
//! Loaded once per ingestion run from the `jp/equities` table and reused by
//! every later stage; callers hold the `Catalog` rather than re-reading it.

use crate::schema::{CatalogSchema, SchemaError};
use crate::store::{StoreError, TableStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Store key of the catalog table.
pub const EQUITIES_KEY: &str = "jp/equities";

/// One catalog row: identifier, ticker symbol, display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub sid: u32,
    pub symbol: String,
    pub asset_name: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("catalog schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("catalog row {row}: {message}")]
    Row { row: usize, message: String },

    #[error("duplicate sid {sid} in catalog")]
    DuplicateSid { sid: u32 },
}

/// The instrument catalog, in store order.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Load the full catalog from the store. No filtering, no pagination.
    pub fn load(store: &TableStore) -> Result<Self, CatalogError> {
        let df = store.read(EQUITIES_KEY)?;
        CatalogSchema::validate(&df)?;

        let sids = df.column("sid").map_err(col_err)?.u32().map_err(col_err)?;
        let symbols = df
            .column("symbol")
            .map_err(col_err)?
            .str()
            .map_err(col_err)?;
        let names = df
            .column("asset_name")
            .map_err(col_err)?
            .str()
            .map_err(col_err)?;

        let mut entries = Vec::with_capacity(df.height());
        let mut seen = BTreeSet::new();
        for row in 0..df.height() {
            let sid = sids.get(row).ok_or_else(|| CatalogError::Row {
                row,
                message: "null sid".into(),
            })?;
            if !seen.insert(sid) {
                return Err(CatalogError::DuplicateSid { sid });
            }
            let symbol = symbols.get(row).ok_or_else(|| CatalogError::Row {
                row,
                message: "null symbol".into(),
            })?;
            let asset_name = names.get(row).ok_or_else(|| CatalogError::Row {
                row,
                message: "null asset_name".into(),
            })?;
            entries.push(CatalogEntry {
                sid,
                symbol: symbol.to_string(),
                asset_name: asset_name.to_string(),
            });
        }

        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.entries.iter()
    }

    /// Look up an entry by sid. Sids are unique but not assumed dense.
    pub fn get(&self, sid: u32) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.sid == sid)
    }
}

fn col_err(e: polars::prelude::PolarsError) -> CatalogError {
    CatalogError::Row {
        row: 0,
        message: e.to_string(),
    }
}
