//! Store-root resolution from the environment.
//!
//! The only configuration this system takes is one environment variable
//! naming the data root; the keyed store lives in its `custom_data`
//! subdirectory. A missing variable is a fatal, user-visible error raised
//! before anything touches the store.

use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming the kabufeed data root.
pub const ROOT_ENV: &str = "KABUFEED_ROOT";

/// Subdirectory of the data root that holds the keyed store.
const STORE_SUBDIR: &str = "custom_data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "environment variable {var} is not set; point it at the kabufeed data root \
         (the store is read from its custom_data subdirectory)"
    )]
    MissingRoot { var: &'static str },
}

/// Resolve the store root from `KABUFEED_ROOT`.
///
/// Returns `$KABUFEED_ROOT/custom_data`. Does not check the directory
/// exists — that is the store's job, so the two failure modes stay distinct.
pub fn store_root() -> Result<PathBuf, ConfigError> {
    store_root_from(ROOT_ENV)
}

fn store_root_from(var: &'static str) -> Result<PathBuf, ConfigError> {
    match std::env::var_os(var) {
        Some(v) if !v.is_empty() => Ok(PathBuf::from(v).join(STORE_SUBDIR)),
        _ => Err(ConfigError::MissingRoot { var }),
    }
}
