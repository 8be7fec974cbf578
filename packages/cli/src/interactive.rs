//! Menu-driven front end.
//!
//! Running `catalog` without a subcommand lands here. The browser is
//! read-only; crawling and exporting reuse the same code paths as their
//! subcommands.

use std::path::Path;

use catalog_book_models::BookQuery;
use catalog_cli_utils::MultiProgress;
use catalog_crawl::CrawlOptions;
use catalog_export::ExportFormat;
use dialoguer::{Confirm, Input, Select};

use crate::viewer;

/// Top-level actions.
enum Tool {
    Crawl,
    Export,
    Browse,
}

impl Tool {
    const ALL: &[Self] = &[Self::Crawl, Self::Export, Self::Browse];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Crawl => "Crawl the catalogue",
            Self::Export => "Export stored books",
            Self::Browse => "Browse stored books",
        }
    }
}

/// Actions inside the browser loop.
enum BrowseAction {
    Search,
    FilterCategory,
    ShowAll,
    Statistics,
    Quit,
}

impl BrowseAction {
    const ALL: &[Self] = &[
        Self::Search,
        Self::FilterCategory,
        Self::ShowAll,
        Self::Statistics,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Search => "Search by title",
            Self::FilterCategory => "Filter by category",
            Self::ShowAll => "Show all books",
            Self::Statistics => "Statistics",
            Self::Quit => "Quit",
        }
    }
}

/// Prompts for a tool and runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected tool fails.
pub async fn run(
    multi: &MultiProgress,
    db_path: &Path,
    export_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Book Catalogue");
    println!();

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Tool::ALL[idx] {
        Tool::Crawl => crawl(multi, db_path, export_dir).await?,
        Tool::Export => export(db_path, export_dir)?,
        Tool::Browse => browse(db_path)?,
    }

    Ok(())
}

async fn crawl(
    multi: &MultiProgress,
    db_path: &Path,
    export_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let categories: String = Input::new()
        .with_prompt("Categories to crawl (comma-separated, empty for all)")
        .allow_empty(true)
        .interact_text()?;

    let polite = Confirm::new()
        .with_prompt("Pause between requests?")
        .default(true)
        .interact()?;

    let mut options = CrawlOptions::default()
        .with_db_path(db_path)
        .with_categories(crate::split_list(&categories));
    if !polite {
        options = options.with_delays(
            std::time::Duration::ZERO,
            std::time::Duration::ZERO,
            std::time::Duration::ZERO,
        );
    }

    crate::run_crawl(multi, &options, export_dir).await
}

fn export(db_path: &Path, export_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let formats = [ExportFormat::Csv, ExportFormat::Xlsx, ExportFormat::All];
    let labels: Vec<String> = formats.iter().map(ToString::to_string).collect();

    let idx = Select::new()
        .with_prompt("Export format")
        .items(&labels)
        .default(2)
        .interact()?;

    crate::run_export(db_path, export_dir, formats[idx])
}

/// Runs the read-only browser until the user quits.
///
/// # Errors
///
/// Returns an error if the store cannot be read or a prompt fails.
pub fn browse(db_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let conn = crate::open_existing(db_path)?;
    let labels: Vec<&str> = BrowseAction::ALL.iter().map(BrowseAction::label).collect();

    loop {
        println!();
        let idx = Select::new()
            .with_prompt("Browse")
            .items(&labels)
            .default(0)
            .interact()?;

        match BrowseAction::ALL[idx] {
            BrowseAction::Search => {
                let term: String = Input::new()
                    .with_prompt("Title contains")
                    .interact_text()?;
                println!("{}", viewer::search(&conn, term.trim(), None)?);
            }
            BrowseAction::FilterCategory => {
                let categories = catalog_database::book_db::categories(&conn)?;
                if categories.is_empty() {
                    println!("No categories stored yet.");
                    continue;
                }
                let pick = Select::new()
                    .with_prompt("Category")
                    .items(&categories)
                    .max_length(20)
                    .interact()?;
                let query = BookQuery::default().with_category(&categories[pick]);
                println!("{}", viewer::list(&conn, &query)?);
            }
            BrowseAction::ShowAll => {
                println!("{}", viewer::list(&conn, &BookQuery::default())?);
            }
            BrowseAction::Statistics => println!("{}", viewer::stats(&conn)?),
            BrowseAction::Quit => break,
        }
    }

    Ok(())
}
