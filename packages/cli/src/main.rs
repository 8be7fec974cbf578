#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `catalog`: crawl the book catalogue, export it, and view what was
//! stored.
//!
//! Settings come from flags with environment fallbacks; a `.env` file in
//! the working directory is loaded first. Logging goes through
//! [`catalog_cli_utils::init_logger`] so log lines and the crawl progress
//! bar share the terminal.

mod interactive;
mod viewer;

use std::path::{Path, PathBuf};
use std::time::Duration;

use catalog_book_models::BookQuery;
use catalog_cli_utils::{IndicatifProgress, MultiProgress};
use catalog_crawl::sink::CsvSink;
use catalog_crawl::{CrawlOptions, DEFAULT_BASE_URL, crawl_catalogue};
use catalog_database::{Connection, book_db};
use catalog_export::ExportFormat;
use catalog_scraper::HttpFetcher;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "catalog", about = "Book catalogue crawler and viewer")]
struct Cli {
    /// `DuckDB` file holding scraped books [default: data/books.duckdb]
    #[arg(long, global = true, env = "CATALOG_DB_PATH")]
    db: Option<PathBuf>,
    /// Root directory for CSV and XLSX output
    #[arg(long, global = true, env = "CATALOG_EXPORT_DIR", default_value = "exports")]
    export_dir: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every category and store the books
    Crawl {
        /// Site root holding the category sidebar
        #[arg(long, env = "CATALOG_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,
        /// Comma-separated category names to crawl (case-insensitive)
        #[arg(long, env = "CATALOG_CATEGORIES")]
        categories: Option<String>,
        /// Maximum number of categories to crawl
        #[arg(long)]
        max_categories: Option<usize>,
        /// Pause after each item, in milliseconds
        #[arg(long, default_value = "1000")]
        item_delay_ms: u64,
        /// Pause between listing pages, in milliseconds
        #[arg(long, default_value = "1000")]
        page_delay_ms: u64,
        /// Pause between categories, in milliseconds
        #[arg(long, default_value = "2000")]
        category_delay_ms: u64,
    },
    /// Export stored books (csv, xlsx or all)
    Export {
        /// Output format
        #[arg(default_value = "all")]
        format: ExportFormat,
    },
    /// Show totals and price statistics per category
    Stats,
    /// List stored books
    List {
        /// Maximum number of books to show
        #[arg(long, default_value = "50")]
        limit: u32,
        /// Only show books in this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Search stored books by title
    Search {
        /// Case-insensitive title fragment
        term: String,
        /// Only search this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Browse stored books interactively
    Browse,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let multi = catalog_cli_utils::init_logger();
    let cli = Cli::parse();

    let db_path = cli
        .db
        .unwrap_or_else(catalog_database::paths::default_db_path);

    let Some(command) = cli.command else {
        return interactive::run(&multi, &db_path, &cli.export_dir).await;
    };

    match command {
        Commands::Crawl {
            base_url,
            categories,
            max_categories,
            item_delay_ms,
            page_delay_ms,
            category_delay_ms,
        } => {
            let options = CrawlOptions::default()
                .with_base_url(base_url)
                .with_db_path(&db_path)
                .with_categories(categories.as_deref().map(split_list).unwrap_or_default())
                .with_max_categories(max_categories)
                .with_delays(
                    Duration::from_millis(item_delay_ms),
                    Duration::from_millis(page_delay_ms),
                    Duration::from_millis(category_delay_ms),
                );
            run_crawl(&multi, &options, &cli.export_dir).await?;
        }
        Commands::Export { format } => run_export(&db_path, &cli.export_dir, format)?,
        Commands::Stats => {
            let conn = open_existing(&db_path)?;
            println!("{}", viewer::stats(&conn)?);
        }
        Commands::List { limit, category } => {
            let conn = open_existing(&db_path)?;
            let mut query = BookQuery::default().with_limit(limit);
            if let Some(category) = category.as_deref() {
                query = query.with_category(category);
            }
            println!("{}", viewer::list(&conn, &query)?);
        }
        Commands::Search { term, category } => {
            let conn = open_existing(&db_path)?;
            println!("{}", viewer::search(&conn, &term, category.as_deref())?);
        }
        Commands::Browse => interactive::browse(&db_path)?,
    }

    Ok(())
}

/// Crawls with `options`, writing the live CSV under `export_dir`.
async fn run_crawl(
    multi: &MultiProgress,
    options: &CrawlOptions,
    export_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = HttpFetcher::new()?;
    let mut csv = CsvSink::for_run(export_dir)?;
    log::info!("Writing live CSV to {}", csv.path().display());

    let progress = IndicatifProgress::categories_bar(multi, "Reading categories");
    let summary = crawl_catalogue(&fetcher, options, &mut csv, progress).await;

    println!(
        "Crawled {} categories: {} books stored, {} items skipped",
        summary.categories.len(),
        summary.records(),
        summary.skipped()
    );
    if summary.failed_categories > 0 {
        println!(
            "{} categories skipped (store unavailable)",
            summary.failed_categories
        );
    }

    Ok(())
}

fn run_export(
    db_path: &Path,
    export_dir: &Path,
    format: ExportFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_existing(db_path)?;
    let written = catalog_export::export(&conn, export_dir, format)?;

    if written.is_empty() {
        println!("No data to export");
    }
    for path in written {
        println!("Exported to {}", path.display());
    }

    Ok(())
}

/// Opens the store for reading, refusing to create a new one.
fn open_existing(db_path: &Path) -> Result<Connection, Box<dyn std::error::Error>> {
    if !db_path.exists() {
        return Err(format!(
            "no database at {}; run `catalog crawl` first",
            db_path.display()
        )
        .into());
    }
    Ok(book_db::open(db_path)?)
}

/// Splits a comma-separated list, dropping blank entries.
fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
