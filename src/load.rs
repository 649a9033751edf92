use std::fmt;
use std::path::Path;

use anyhow::{bail, Result};
use tracing::{error, info};

use crate::config::LoadConfig;
use crate::csv_file;
use crate::db;
use crate::product::CleanProductRecord;
use crate::transform::fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Csv,
    Sqlite,
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Csv => f.write_str("CSV"),
            Sink::Sqlite => f.write_str("SQLite"),
        }
    }
}

pub struct SinkReport {
    pub sink: Sink,
    pub result: Result<usize>,
}

/// Checks the table handed to the sinks, independently of the cleaner.
pub fn validate_table(rows: &[CleanProductRecord]) -> Result<()> {
    if rows.is_empty() {
        bail!("Empty table");
    }
    for (i, r) in rows.iter().enumerate() {
        if r.title.trim().is_empty() {
            bail!("Row {}: empty title", i);
        }
        if !(r.price_idr.is_finite() && r.price_idr > 0.0) {
            bail!("Row {}: invalid price {}", i, r.price_idr);
        }
        if !(0.0..=5.0).contains(&r.rating) {
            bail!("Row {}: invalid rating {}", i, r.rating);
        }
        if r.colors <= 0 {
            bail!("Row {}: invalid color count {}", i, r.colors);
        }
        if fields::parse_datetime(&r.timestamp).is_none() {
            bail!("Row {}: invalid timestamp {:?}", i, r.timestamp);
        }
    }
    Ok(())
}

pub fn load_csv(rows: &[CleanProductRecord], path: &Path) -> Result<usize> {
    validate_table(rows)?;
    info!("Saving {} rows to {}", rows.len(), path.display());
    csv_file::write_records(path, rows)
}

pub fn load_sqlite(rows: &[CleanProductRecord], path: &Path) -> Result<usize> {
    validate_table(rows)?;
    info!("Uploading {} rows to {}", rows.len(), path.display());
    let conn = db::connect(path)?;
    db::init_schema(&conn)?;
    db::replace_products(&conn, rows)
}

/// Run every configured sink. One failing sink does not stop the others.
pub fn load_all(rows: &[CleanProductRecord], config: &LoadConfig) -> Vec<SinkReport> {
    let mut reports = vec![SinkReport {
        sink: Sink::Csv,
        result: load_csv(rows, &config.csv_path),
    }];
    if let Some(db_path) = &config.db_path {
        reports.push(SinkReport {
            sink: Sink::Sqlite,
            result: load_sqlite(rows, db_path),
        });
    }

    for r in &reports {
        match &r.result {
            Ok(n) => info!("{}: saved {} rows", r.sink, n),
            Err(e) => error!("{}: {:#}", r.sink, e),
        }
    }
    reports
}
