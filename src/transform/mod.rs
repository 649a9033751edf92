pub mod fields;

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::info;

use crate::config::TransformConfig;
use crate::product::{CleanProductRecord, Gender, RawProductRecord, Size};

/// Row counts after each cleaning step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub initial: usize,
    pub after_nulls: usize,
    pub after_unknown: usize,
    pub after_duplicates: usize,
    pub after_domain: usize,
}

impl CleanReport {
    fn log(&self) {
        info!("Initial records: {}", self.initial);
        info!(
            "After removing nulls: {} (removed {})",
            self.after_nulls,
            self.initial - self.after_nulls
        );
        info!(
            "After removing unknown products: {} (removed {})",
            self.after_unknown,
            self.after_nulls - self.after_unknown
        );
        info!(
            "After removing duplicates: {} (removed {})",
            self.after_duplicates,
            self.after_unknown - self.after_duplicates
        );
        info!(
            "After domain checks: {} (removed {})",
            self.after_domain,
            self.after_duplicates - self.after_domain
        );
    }
}

pub struct Cleaned {
    pub records: Vec<CleanProductRecord>,
    pub report: CleanReport,
}

/// A raw record after per-field normalization, before any filtering.
#[derive(Debug, Clone, PartialEq)]
struct Normalized {
    title: Option<String>,
    price: Option<f64>,
    rating: Option<f64>,
    colors: Option<i32>,
    size: Option<Size>,
    gender: Option<Gender>,
    timestamp: Option<String>,
}

impl Normalized {
    fn complete(self) -> Option<CleanProductRecord> {
        Some(CleanProductRecord {
            title: self.title?,
            price_idr: self.price?,
            rating: self.rating?,
            colors: self.colors?,
            size: self.size?,
            gender: self.gender?,
            timestamp: self.timestamp?,
        })
    }
}

#[derive(PartialEq, Eq, Hash)]
struct RowKey {
    title: String,
    price: u64,
    rating: u64,
    colors: i32,
    size: Size,
    gender: Gender,
    timestamp: String,
}

impl From<&CleanProductRecord> for RowKey {
    fn from(r: &CleanProductRecord) -> Self {
        Self {
            title: r.title.clone(),
            price: r.price_idr.to_bits(),
            rating: r.rating.to_bits(),
            colors: r.colors,
            size: r.size,
            gender: r.gender,
            timestamp: r.timestamp.clone(),
        }
    }
}

pub struct RecordCleaner {
    config: TransformConfig,
}

impl RecordCleaner {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    fn normalize(&self, raw: &RawProductRecord) -> Normalized {
        Normalized {
            title: raw.title.clone(),
            price: fields::price(raw.price_text.as_deref(), self.config.exchange_rate),
            rating: fields::rating(raw.rating_text.as_deref()),
            colors: fields::colors(raw.colors_text.as_deref()),
            size: fields::size(raw.size_text.as_deref()),
            gender: fields::gender(raw.gender_text.as_deref()),
            timestamp: fields::timestamp(Some(raw.timestamp.as_str())),
        }
    }

    /// Normalize, drop incomplete rows, drop placeholders, dedupe, range-check.
    pub fn clean(&self, raw: &[RawProductRecord]) -> Cleaned {
        info!("Starting data transformation on {} records", raw.len());
        let normalized: Vec<Normalized> = raw.par_iter().map(|r| self.normalize(r)).collect();
        let initial = normalized.len();

        let complete: Vec<CleanProductRecord> =
            normalized.into_iter().filter_map(Normalized::complete).collect();
        let after_nulls = complete.len();

        self.finish(complete, initial, after_nulls)
    }

    /// Reapply the filters to an already typed table. Cleaning a clean table is a no-op.
    pub fn reclean(&self, table: Vec<CleanProductRecord>) -> Cleaned {
        let n = table.len();
        self.finish(table, n, n)
    }

    fn finish(
        &self,
        records: Vec<CleanProductRecord>,
        initial: usize,
        after_nulls: usize,
    ) -> Cleaned {
        let mut records: Vec<CleanProductRecord> = records
            .into_iter()
            .filter(|r| r.title != self.config.unknown_title)
            .collect();
        let after_unknown = records.len();

        let mut seen = HashSet::with_capacity(records.len());
        records.retain(|r| seen.insert(RowKey::from(r)));
        let after_duplicates = records.len();

        records.retain(in_domain);
        let after_domain = records.len();

        let report = CleanReport {
            initial,
            after_nulls,
            after_unknown,
            after_duplicates,
            after_domain,
        };
        report.log();
        Cleaned { records, report }
    }
}

fn in_domain(r: &CleanProductRecord) -> bool {
    !r.title.trim().is_empty()
        && r.price_idr.is_finite()
        && r.price_idr > 0.0
        && (0.0..=5.0).contains(&r.rating)
        && r.colors > 0
}
