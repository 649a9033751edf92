use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::ScrapeConfig;
use crate::fetch::{FetchError, PageSession, PageSource};
use crate::parser;
use crate::product::RawProductRecord;

/// Harvest stats returned after completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStats {
    pub pages: usize,
    pub pages_ok: usize,
    pub pages_failed: usize,
    pub pages_unparsed: usize,
    pub chunks: usize,
    pub chunks_failed: usize,
    pub records: usize,
}

pub struct Harvest {
    /// Completion order; not stable across runs.
    pub records: Vec<RawProductRecord>,
    pub stats: HarvestStats,
}

struct ChunkReport {
    records: Vec<RawProductRecord>,
    pages_ok: usize,
    pages_unparsed: usize,
}

/// Split `1..=num_pages` into contiguous chunks of `ceil(num_pages / max_workers)`.
/// The last chunk may be shorter; there are never more chunks than workers.
pub fn partition_pages(num_pages: u32, max_workers: usize) -> Vec<Vec<u32>> {
    if num_pages == 0 {
        return Vec::new();
    }
    let workers = u32::try_from(max_workers).unwrap_or(u32::MAX).max(1);
    let chunk_size = num_pages.div_ceil(workers) as usize;
    let pages: Vec<u32> = (1..=num_pages).collect();
    pages.chunks(chunk_size).map(<[u32]>::to_vec).collect()
}

/// Fetch and parse every page, one task per chunk. Failed pages and chunks are
/// logged and left out; the result is empty only when nothing could be used.
pub async fn harvest<S: PageSource>(source: Arc<S>, config: &ScrapeConfig) -> Harvest {
    let chunks = partition_pages(config.num_pages, config.max_workers);
    let total_chunks = chunks.len();
    let mut stats = HarvestStats {
        pages: config.num_pages as usize,
        chunks: total_chunks,
        ..Default::default()
    };

    let pb = ProgressBar::new(stats.pages as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} pages ({per_sec}, eta {eta})")
            .map(|s| s.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    info!(
        "Harvesting {} pages from {} in {} chunks",
        stats.pages, config.base_url, total_chunks
    );

    // partition_pages never yields more chunks than workers, so each chunk
    // gets its own task and in-flight work stays within max_workers.
    let config = Arc::new(config.clone());
    let mut tasks = JoinSet::new();
    for (index, pages) in chunks.into_iter().enumerate() {
        let source = Arc::clone(&source);
        let config = Arc::clone(&config);
        let pb = pb.clone();
        tasks.spawn(async move { (index, harvest_chunk(&*source, &config, &pages, &pb).await) });
    }

    let mut records = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(report))) => {
                stats.pages_ok += report.pages_ok;
                stats.pages_unparsed += report.pages_unparsed;
                records.extend(report.records);
                info!("Completed chunk {}/{}", index + 1, total_chunks);
            }
            Ok((index, Err(e))) => {
                stats.chunks_failed += 1;
                error!("Error processing chunk {}: {}", index + 1, e);
            }
            Err(e) => {
                stats.chunks_failed += 1;
                error!("Chunk task did not finish: {}", e);
            }
        }
    }
    pb.finish_and_clear();

    stats.pages_failed = stats.pages - stats.pages_ok;
    stats.records = records.len();
    info!(
        "Harvested {} records from {} pages ({} ok, {} failed, {} without listings)",
        stats.records, stats.pages, stats.pages_ok, stats.pages_failed, stats.pages_unparsed
    );
    if records.is_empty() {
        warn!("Harvest produced no records");
    }

    Harvest { records, stats }
}

/// Pages of one chunk, in order, over a single session.
async fn harvest_chunk<S: PageSource>(
    source: &S,
    config: &ScrapeConfig,
    pages: &[u32],
    pb: &ProgressBar,
) -> Result<ChunkReport, FetchError> {
    let mut session = source.open_session()?;
    let mut report = ChunkReport {
        records: Vec::new(),
        pages_ok: 0,
        pages_unparsed: 0,
    };

    for (i, &page) in pages.iter().enumerate() {
        match session.fetch(page).await {
            Ok(markup) => {
                report.pages_ok += 1;
                match parser::parse_page(&markup) {
                    Ok(found) => {
                        info!("Found {} products on page {}", found.len(), page);
                        report.records.extend(found);
                    }
                    Err(e) => {
                        report.pages_unparsed += 1;
                        error!("Page {}: {}", page, e);
                    }
                }
                if i + 1 < pages.len() {
                    tokio::time::sleep(config.politeness_delay()).await;
                }
            }
            Err(e) => warn!("Error on page {}: {}", page, e),
        }
        pb.inc(1);
    }

    Ok(report)
}
