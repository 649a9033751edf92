use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::{LoadConfig, ScrapeConfig, TransformConfig};
use crate::csv_file;
use crate::fetch::PageSource;
use crate::harvest::{self, HarvestStats};
use crate::load::{self, SinkReport};
use crate::product::RawProductRecord;
use crate::transform::{CleanReport, Cleaned, RecordCleaner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Transform,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extract => f.write_str("extraction"),
            Stage::Transform => f.write_str("transformation"),
        }
    }
}

pub struct RunReport {
    pub harvest: Option<HarvestStats>,
    pub raw_count: usize,
    pub clean: CleanReport,
    pub sinks: Vec<SinkReport>,
}

pub enum Outcome {
    /// Nothing usable came out of `stage`; no sink was touched.
    Empty { stage: Stage },
    Loaded(RunReport),
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        match self {
            Outcome::Empty { .. } => false,
            Outcome::Loaded(report) => report.sinks.iter().all(|s| s.result.is_ok()),
        }
    }
}

/// Extract → transform → load.
pub async fn run<S: PageSource>(
    source: Arc<S>,
    scrape: &ScrapeConfig,
    transform: &TransformConfig,
    load: &LoadConfig,
) -> Outcome {
    let harvested = harvest::harvest(source, scrape).await;
    if harvested.records.is_empty() {
        warn!("Extraction failed: no data retrieved");
        return Outcome::Empty {
            stage: Stage::Extract,
        };
    }

    if let Some(path) = &load.raw_csv_path {
        match csv_file::write_records(path, &harvested.records) {
            Ok(n) => info!("Wrote {} raw records to {}", n, path.display()),
            Err(e) => warn!("Could not write raw dump: {:#}", e),
        }
    }

    transform_and_load(harvested.records, Some(harvested.stats), transform, load)
}

/// Clean a raw dump from an earlier run and load it.
pub fn run_from_dump(input: &Path, transform: &TransformConfig, load: &LoadConfig) -> Result<Outcome> {
    let raw = csv_file::read_raw(input)?;
    info!("Read {} raw records from {}", raw.len(), input.display());
    if raw.is_empty() {
        return Ok(Outcome::Empty {
            stage: Stage::Extract,
        });
    }
    Ok(transform_and_load(raw, None, transform, load))
}

/// Re-check a table written by the CSV sink and load it again.
pub fn run_from_table(input: &Path, transform: &TransformConfig, load: &LoadConfig) -> Result<Outcome> {
    let table = csv_file::read_clean(input)?;
    info!("Read {} cleaned records from {}", table.len(), input.display());
    if table.is_empty() {
        return Ok(Outcome::Empty {
            stage: Stage::Extract,
        });
    }
    let count = table.len();
    let cleaned = RecordCleaner::new(transform.clone()).reclean(table);
    Ok(load_cleaned(cleaned, count, None, load))
}

fn transform_and_load(
    raw: Vec<RawProductRecord>,
    harvest: Option<HarvestStats>,
    transform: &TransformConfig,
    load: &LoadConfig,
) -> Outcome {
    let raw_count = raw.len();
    let cleaned = RecordCleaner::new(transform.clone()).clean(&raw);
    drop(raw);
    load_cleaned(cleaned, raw_count, harvest, load)
}

fn load_cleaned(
    cleaned: Cleaned,
    raw_count: usize,
    harvest: Option<HarvestStats>,
    load: &LoadConfig,
) -> Outcome {
    if cleaned.records.is_empty() {
        warn!("Transformation failed: no valid data after cleaning");
        return Outcome::Empty {
            stage: Stage::Transform,
        };
    }

    let sinks = load::load_all(&cleaned.records, load);
    Outcome::Loaded(RunReport {
        harvest,
        raw_count,
        clean: cleaned.report,
        sinks,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::fetch::{FetchError, PageSession};
    use crate::product::{CleanProductRecord, Gender, Size};

    struct MapSource(Arc<HashMap<u32, String>>);
    struct MapSession(Arc<HashMap<u32, String>>);

    impl PageSource for MapSource {
        type Session = MapSession;

        fn open_session(&self) -> Result<MapSession, FetchError> {
            Ok(MapSession(Arc::clone(&self.0)))
        }
    }

    impl PageSession for MapSession {
        async fn fetch(&mut self, page: u32) -> Result<Vec<u8>, FetchError> {
            self.0
                .get(&page)
                .map(|html| html.clone().into_bytes())
                .ok_or(FetchError::Status {
                    url: format!("/page{}", page),
                    status: 500,
                })
        }
    }

    fn page(card: &str) -> String {
        format!(
            r#"<html><body><div id="collectionList"><div class="collection-card">{}</div></div></body></html>"#,
            card
        )
    }

    const VALID_CARD: &str = r#"<div class="product-details">
        <h3 class="product-title">T-shirt 2</h3>
        <div class="price-container"><span class="price">$102.15</span></div>
        <p style="font-size: 14px; color: #777;">Rating: ⭐ 3.9 / 5</p>
        <p style="font-size: 14px; color: #777;">3 Colors</p>
        <p style="font-size: 14px; color: #777;">Size: M</p>
        <p style="font-size: 14px; color: #777;">Gender: Women</p>
    </div>"#;

    const UNTITLED_CARD: &str = r#"<div class="product-details">
        <div class="price-container"><span class="price">$50.00</span></div>
        <p style="font-size: 14px; color: #777;">Rating: ⭐ 4.0 / 5</p>
        <p style="font-size: 14px; color: #777;">2 Colors</p>
        <p style="font-size: 14px; color: #777;">Size: S</p>
        <p style="font-size: 14px; color: #777;">Gender: Men</p>
    </div>"#;

    fn scrape(num_pages: u32) -> ScrapeConfig {
        ScrapeConfig {
            num_pages,
            max_workers: 2,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn outputs(dir: &Path) -> LoadConfig {
        LoadConfig {
            csv_path: dir.join("clean.csv"),
            raw_csv_path: Some(dir.join("raw.csv")),
            db_path: Some(dir.join("products.sqlite")),
        }
    }

    #[tokio::test]
    async fn one_valid_card_survives() {
        let dir = tempfile::tempdir().unwrap();
        let load = outputs(dir.path());
        let pages = HashMap::from([(1, page(VALID_CARD)), (2, page(UNTITLED_CARD))]);

        let outcome = run(
            Arc::new(MapSource(Arc::new(pages))),
            &scrape(2),
            &TransformConfig::default(),
            &load,
        )
        .await;
        assert!(outcome.succeeded());

        let Outcome::Loaded(report) = outcome else {
            panic!("expected a loaded run");
        };
        assert_eq!(report.raw_count, 2);
        assert_eq!(report.clean.after_domain, 1);

        let mut rdr = csv::Reader::from_path(&load.csv_path).unwrap();
        let rows: Vec<CleanProductRecord> = rdr.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.title, "T-shirt 2");
        assert_eq!(r.price_idr, 102.15 * 16000.0);
        assert_eq!(r.rating, 3.9);
        assert_eq!(r.colors, 3);
        assert_eq!(r.size, Size::M);
        assert_eq!(r.gender, Gender::Women);
        assert_eq!(r.timestamp.len(), "YYYY-MM-DD HH:MM:SS".len());

        assert_eq!(csv_file::read_raw(load.raw_csv_path.as_deref().unwrap()).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn total_fetch_failure_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let load = outputs(dir.path());

        let outcome = run(
            Arc::new(MapSource(Arc::new(HashMap::new()))),
            &scrape(4),
            &TransformConfig::default(),
            &load,
        )
        .await;
        assert!(!outcome.succeeded());
        assert!(matches!(outcome, Outcome::Empty { stage: Stage::Extract }));
        assert!(!load.csv_path.exists());
        assert!(!load.raw_csv_path.unwrap().exists());
        assert!(!load.db_path.unwrap().exists());
    }

    #[tokio::test]
    async fn nothing_valid_after_cleaning() {
        let dir = tempfile::tempdir().unwrap();
        let load = outputs(dir.path());
        let pages = HashMap::from([(1, page(UNTITLED_CARD))]);

        let outcome = run(
            Arc::new(MapSource(Arc::new(pages))),
            &scrape(1),
            &TransformConfig::default(),
            &load,
        )
        .await;
        assert!(matches!(outcome, Outcome::Empty { stage: Stage::Transform }));
        assert!(!load.csv_path.exists());
    }

    #[test]
    fn cleans_a_raw_dump() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        let markup = std::fs::read("tests/fixtures/listing.html").unwrap();
        let raw = crate::parser::parse_page(&markup).unwrap();
        csv_file::write_records(&input, &raw).unwrap();

        let load = LoadConfig {
            raw_csv_path: None,
            db_path: None,
            ..outputs(dir.path())
        };
        let outcome = run_from_dump(&input, &TransformConfig::default(), &load).unwrap();
        let Outcome::Loaded(report) = outcome else {
            panic!("expected a loaded run");
        };
        // T-shirt 2, Hoodie 3 and Outerwear 5; the placeholder and the unrated pants are dropped
        assert_eq!(report.raw_count, 5);
        assert_eq!(report.clean.after_domain, 3);
        assert_eq!(report.sinks.len(), 1);
        assert!(report.harvest.is_none());
    }

    #[test]
    fn reloads_a_cleaned_table() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("previous.csv");
        let row = CleanProductRecord {
            title: "Hoodie 3".into(),
            price_idr: 7950080.0,
            rating: 4.8,
            colors: 3,
            size: Size::L,
            gender: Gender::Unisex,
            timestamp: "2024-03-01 10:15:30".into(),
        };
        let placeholder = CleanProductRecord {
            title: "Unknown Product".into(),
            ..row.clone()
        };
        csv_file::write_records(&input, &[row.clone(), row.clone(), placeholder]).unwrap();

        let load = LoadConfig {
            raw_csv_path: None,
            ..outputs(dir.path())
        };
        let outcome = run_from_table(&input, &TransformConfig::default(), &load).unwrap();
        assert!(outcome.succeeded());
        let Outcome::Loaded(report) = outcome else {
            panic!("expected a loaded run");
        };
        assert_eq!(report.raw_count, 3);
        assert_eq!(report.clean.after_domain, 1);
        assert_eq!(csv_file::read_clean(&load.csv_path).unwrap(), vec![row]);
    }
}
