//! Read-only keyed parquet store.
//!
//! Layout: `{root}/{key}.parquet`, one table per key. Keys are slash
//! namespaced (`jp/equities`, `jp/7203`, `jp/splits`). The store is opened
//! read-only per call; nothing here writes or holds files open across
//! reads.

use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store root not found: {0}")]
    RootNotFound(String),

    #[error("table '{key}' not found in store")]
    TableNotFound { key: String },

    #[error("read table '{key}': {message}")]
    Read { key: String, message: String },
}

/// A directory of parquet tables addressed by key.
pub struct TableStore {
    root: PathBuf,
}

impl TableStore {
    /// Open a store at `root`. Fails if the directory does not exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::RootNotFound(root.display().to_string()));
        }
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk path for a key: `{root}/{key}.parquet`.
    pub fn table_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.parquet"))
    }

    /// Whether a table exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.table_path(key).is_file()
    }

    /// Read the full table under `key`.
    pub fn read(&self, key: &str) -> Result<DataFrame, StoreError> {
        let path = self.table_path(key);
        if !path.is_file() {
            return Err(StoreError::TableNotFound {
                key: key.to_string(),
            });
        }
        let file = fs::File::open(&path).map_err(|e| StoreError::Read {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| StoreError::Read {
                key: key.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_store_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("kabufeed_store_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("jp")).unwrap();
        dir
    }

    fn write_table(dir: &Path, key: &str, df: &DataFrame) {
        let path = dir.join(format!("{key}.parquet"));
        let file = fs::File::create(path).unwrap();
        ParquetWriter::new(file).finish(&mut df.clone()).unwrap();
    }

    #[test]
    fn open_missing_root_fails() {
        let result = TableStore::open("/nonexistent/kabufeed/store");
        assert!(matches!(result, Err(StoreError::RootNotFound(_))));
    }

    #[test]
    fn read_roundtrip() {
        let dir = temp_store_dir();
        let df = df!(
            "sid" => &[7203u32, 6758],
            "symbol" => &["7203.JP", "6758.JP"],
        )
        .unwrap();
        write_table(&dir, "jp/equities", &df);

        let store = TableStore::open(&dir).unwrap();
        let loaded = store.read("jp/equities").unwrap();
        assert_eq!(loaded.height(), 2);
        assert_eq!(
            loaded.column("symbol").unwrap().str().unwrap().get(0),
            Some("7203.JP")
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_table_is_a_clear_error() {
        let dir = temp_store_dir();
        let store = TableStore::open(&dir).unwrap();

        match store.read("jp/9999") {
            Err(StoreError::TableNotFound { key }) => assert_eq!(key, "jp/9999"),
            other => panic!("expected TableNotFound, got: {other:?}"),
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn contains_reports_presence() {
        let dir = temp_store_dir();
        let df = df!("sid" => &[1u32]).unwrap();
        write_table(&dir, "jp/splits", &df);

        let store = TableStore::open(&dir).unwrap();
        assert!(store.contains("jp/splits"));
        assert!(!store.contains("jp/equities"));

        let _ = fs::remove_dir_all(&dir);
    }
}
