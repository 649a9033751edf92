mod config;
mod csv_file;
mod db;
mod fetch;
mod harvest;
mod load;
mod parser;
mod pipeline;
mod product;
mod transform;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};

use config::{LoadConfig, ScrapeConfig, TransformConfig};
use pipeline::Outcome;

#[derive(Parser)]
#[command(name = "catalog_etl", about = "Fashion catalog scraper: extract, clean, load")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every catalog page, clean the records and load them
    Run {
        #[command(flatten)]
        scrape: ScrapeArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Where to dump raw records before cleaning
        #[arg(long, default_value = config::RAW_CSV_PATH)]
        raw_csv: PathBuf,
        /// Skip the raw dump
        #[arg(long)]
        no_raw_csv: bool,
    },
    /// Clean a raw dump from an earlier run and load it
    Clean {
        /// Raw CSV written by `run`, or a cleaned table with --typed
        #[arg(default_value = config::RAW_CSV_PATH)]
        input: PathBuf,
        /// Input is a cleaned table; re-check it and load it again
        #[arg(long)]
        typed: bool,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Summary of the products table
    Stats {
        #[arg(long, env = "CATALOG_DB", default_value = config::DB_PATH)]
        db: PathBuf,
    },
}

#[derive(Args)]
struct ScrapeArgs {
    /// Catalog root; page N lives at <base-url>/pageN
    #[arg(long, env = "CATALOG_BASE_URL", default_value = config::BASE_URL)]
    base_url: String,
    /// Number of catalog pages
    #[arg(short = 'n', long, env = "CATALOG_PAGES", default_value_t = config::NUM_PAGES)]
    pages: u32,
    /// Concurrent workers
    #[arg(short, long, env = "CATALOG_WORKERS", default_value_t = config::MAX_WORKERS)]
    workers: usize,
    #[arg(long, default_value_t = config::MIN_DELAY_MS)]
    min_delay_ms: u64,
    #[arg(long, default_value_t = config::MAX_DELAY_MS)]
    max_delay_ms: u64,
    /// Per-request timeout
    #[arg(long, default_value_t = config::TIMEOUT_SECS)]
    timeout_secs: u64,
    #[arg(long, default_value = config::USER_AGENT)]
    user_agent: String,
}

#[derive(Args)]
struct OutputArgs {
    /// Cleaned table destination
    #[arg(long, default_value = config::CSV_PATH)]
    csv: PathBuf,
    /// SQLite database receiving the `products` table
    #[arg(long, env = "CATALOG_DB", default_value = config::DB_PATH)]
    db: PathBuf,
    /// Skip the database sink
    #[arg(long)]
    no_db: bool,
    /// USD → IDR rate applied to prices
    #[arg(long, default_value_t = config::EXCHANGE_RATE)]
    exchange_rate: f64,
}

impl ScrapeArgs {
    fn into_config(self) -> ScrapeConfig {
        ScrapeConfig {
            base_url: self.base_url,
            num_pages: self.pages,
            max_workers: self.workers,
            min_delay: Duration::from_millis(self.min_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            headers: vec![("User-Agent".to_string(), self.user_agent)],
        }
    }
}

impl OutputArgs {
    fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            exchange_rate: self.exchange_rate,
            ..Default::default()
        }
    }

    fn load_config(self, raw_csv_path: Option<PathBuf>) -> LoadConfig {
        LoadConfig {
            csv_path: self.csv,
            raw_csv_path,
            db_path: (!self.no_db).then_some(self.db),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run {
            scrape,
            output,
            raw_csv,
            no_raw_csv,
        } => {
            let scrape = scrape.into_config();
            scrape.validate()?;
            let transform = output.transform_config();
            let load = output.load_config((!no_raw_csv).then_some(raw_csv));

            let source = Arc::new(fetch::HttpSource::new(&scrape)?);
            println!(
                "Pipeline: {} pages from {} with {} workers...",
                scrape.num_pages, scrape.base_url, scrape.max_workers
            );
            pipeline::run(source, &scrape, &transform, &load).await
        }
        Commands::Clean {
            input,
            typed,
            output,
        } => {
            let transform = output.transform_config();
            let load = output.load_config(None);
            if typed {
                pipeline::run_from_table(&input, &transform, &load)?
            } else {
                pipeline::run_from_dump(&input, &transform, &load)?
            }
        }
        Commands::Stats { db: db_path } => {
            if !db_path.exists() {
                println!("No database at {}. Run 'run' first.", db_path.display());
                return Ok(ExitCode::FAILURE);
            }
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Products:   {}", s.total);
            println!("Avg price:  {}", fmt_opt(s.avg_price, 0));
            println!("Avg rating: {}", fmt_opt(s.avg_rating, 2));
            for (gender, n) in &s.by_gender {
                println!("  {:<8} {}", gender, n);
            }
            if let Some(at) = s.last_loaded {
                println!("Loaded at:  {}", at);
            }
            return Ok(ExitCode::SUCCESS);
        }
    };

    print_summary(&outcome);

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    Ok(if outcome.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(outcome: &Outcome) {
    let report = match outcome {
        Outcome::Empty { stage } => {
            println!("Pipeline stopped: {} produced no usable records. Nothing was loaded.", stage);
            return;
        }
        Outcome::Loaded(report) => report,
    };

    if let Some(h) = &report.harvest {
        println!(
            "Scraped {} pages ({} ok, {} errors, {}/{} chunks failed)",
            h.pages, h.pages_ok, h.pages_failed, h.chunks_failed, h.chunks
        );
    }
    let c = &report.clean;
    println!("Initial records: {}", report.raw_count);
    println!("Cleaned records: {}", c.after_domain);
    println!(
        "  dropped: {} incomplete, {} placeholders, {} duplicates, {} out of range",
        c.initial - c.after_nulls,
        c.after_nulls - c.after_unknown,
        c.after_unknown - c.after_duplicates,
        c.after_duplicates - c.after_domain,
    );

    println!("\nLoading results:");
    for s in &report.sinks {
        match &s.result {
            Ok(n) => println!("  {:<7} ok ({} rows)", s.sink, n),
            Err(e) => println!("  {:<7} failed: {:#}", s.sink, e),
        }
    }
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|x| format!("{:.*}", decimals, x))
        .unwrap_or_else(|| "-".into())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
