use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::product::{CleanProductRecord, RawProductRecord, COLUMNS};

/// Write rows with a header line taken from the serde field names.
pub fn write_records<T: Serialize>(path: &Path, rows: &[T]) -> Result<usize> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open {} for writing", path.display()))?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

/// Raw dump written by a previous `run`.
pub fn read_raw(path: &Path) -> Result<Vec<RawProductRecord>> {
    read_records(path)
}

/// Cleaned table written by the CSV sink.
pub fn read_clean(path: &Path) -> Result<Vec<CleanProductRecord>> {
    read_records(path)
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let headers = rdr
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?;
    if headers.iter().ne(COLUMNS) {
        bail!(
            "Unexpected columns in {}: expected {}, found {}",
            path.display(),
            COLUMNS.join(","),
            headers.iter().collect::<Vec<_>>().join(",")
        );
    }
    let rows = rdr
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .with_context(|| format!("Malformed row in {}", path.display()))?;
    Ok(rows)
}
