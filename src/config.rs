use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

pub const BASE_URL: &str = "https://fashion-studio.dicoding.dev";
pub const NUM_PAGES: u32 = 50;
pub const MAX_WORKERS: usize = 10;
pub const MIN_DELAY_MS: u64 = 50;
pub const MAX_DELAY_MS: u64 = 100;
pub const TIMEOUT_SECS: u64 = 15;
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const EXCHANGE_RATE: f64 = 16000.0;
pub const UNKNOWN_TITLE: &str = "Unknown Product";

pub const CSV_PATH: &str = "products_cleaned.csv";
pub const RAW_CSV_PATH: &str = "products_raw.csv";
pub const DB_PATH: &str = "data/products.sqlite";

/// Parameters for one extraction run. Built once, then shared read-only.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub num_pages: u32,
    pub max_workers: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            num_pages: NUM_PAGES,
            max_workers: MAX_WORKERS,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            timeout: Duration::from_secs(TIMEOUT_SECS),
            headers: vec![("User-Agent".to_string(), USER_AGENT.to_string())],
        }
    }
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_pages == 0 {
            bail!("page count must be at least 1");
        }
        if self.max_workers == 0 {
            bail!("worker count must be at least 1");
        }
        if self.min_delay > self.max_delay {
            bail!(
                "minimum delay ({:?}) exceeds maximum delay ({:?})",
                self.min_delay,
                self.max_delay
            );
        }
        Ok(())
    }

    /// Uniform random pause in `[min_delay, max_delay]`.
    pub fn politeness_delay(&self) -> Duration {
        let span = self.max_delay.saturating_sub(self.min_delay);
        self.min_delay + span.mul_f64(fastrand::f64())
    }
}

#[derive(Debug, Clone)]
pub struct TransformConfig {
    pub exchange_rate: f64,
    pub unknown_title: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            exchange_rate: EXCHANGE_RATE,
            unknown_title: UNKNOWN_TITLE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub csv_path: PathBuf,
    pub raw_csv_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ScrapeConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_workers_and_pages() {
        let cfg = ScrapeConfig { max_workers: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = ScrapeConfig { num_pages: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_delay() {
        let cfg = ScrapeConfig {
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(100),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn delay_stays_in_bounds() {
        let cfg = ScrapeConfig::default();
        for _ in 0..200 {
            let d = cfg.politeness_delay();
            assert!(d >= cfg.min_delay && d <= cfg.max_delay, "{:?}", d);
        }
    }

    #[test]
    fn zero_width_delay() {
        let cfg = ScrapeConfig {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(cfg.politeness_delay(), Duration::ZERO);
    }
}
