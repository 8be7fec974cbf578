#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crawl loop for the book catalogue.
//!
//! [`crawl_catalogue`] reads the site's category sidebar and walks each
//! category in turn with [`walker::walk_category`], which pages through the
//! listings, extracts every item and hands batches to a
//! [`sink::BatchSink`]. During a real crawl that sink is a
//! [`sink::DualSinkWriter`] writing to the run's live CSV file and to the
//! `books` table.
//!
//! Everything is sequential: one request at a time with fixed pauses in
//! between.

pub mod sink;
pub mod walker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use catalog_database::book_db;
use catalog_scraper::listing::{CategoryLink, category_links};
use catalog_scraper::progress::ProgressCallback;
use catalog_scraper::{PageFetcher, Url, fetch_document};

use crate::sink::{CsvSink, DualSinkWriter};
use crate::walker::{WalkSummary, walk_category};

/// Catalogue crawled when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://books.toscrape.com";

/// Records buffered before each sink flush.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Settings for a crawl run.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Site root holding the category sidebar.
    pub base_url: String,
    /// `DuckDB` file the store sink writes to.
    pub db_path: PathBuf,
    /// Records per flush.
    pub batch_size: usize,
    /// Pause after each item.
    pub item_delay: Duration,
    /// Pause between listing pages of a category.
    pub page_delay: Duration,
    /// Pause between categories.
    pub category_delay: Duration,
    /// Category names to crawl (case-insensitive). Empty means all.
    pub categories: Vec<String>,
    /// Upper bound on the number of categories crawled.
    pub max_categories: Option<usize>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            db_path: catalog_database::paths::default_db_path(),
            batch_size: DEFAULT_BATCH_SIZE,
            item_delay: Duration::from_secs(1),
            page_delay: Duration::from_secs(1),
            category_delay: Duration::from_secs(2),
            categories: Vec::new(),
            max_categories: None,
        }
    }
}

impl CrawlOptions {
    /// Sets the site root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the store file.
    #[must_use]
    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    /// Sets the number of records per flush.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the item, page and category pauses.
    #[must_use]
    pub const fn with_delays(mut self, item: Duration, page: Duration, category: Duration) -> Self {
        self.item_delay = item;
        self.page_delay = page;
        self.category_delay = category;
        self
    }

    /// Restricts the crawl to the named categories.
    #[must_use]
    pub fn with_categories<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = names.into_iter().map(Into::into).collect();
        self
    }

    /// Caps the number of categories crawled.
    #[must_use]
    pub const fn with_max_categories(mut self, max: Option<usize>) -> Self {
        self.max_categories = max;
        self
    }
}

/// Result of walking one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOutcome {
    /// Sidebar name of the category.
    pub name: String,
    /// Walk totals.
    pub walk: WalkSummary,
}

/// Totals for a whole crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Categories walked, in crawl order.
    pub categories: Vec<CategoryOutcome>,
    /// Categories skipped because the store could not be opened.
    pub failed_categories: usize,
}

impl CrawlSummary {
    /// Records extracted across all categories.
    #[must_use]
    pub fn records(&self) -> usize {
        self.categories.iter().map(|c| c.walk.records).sum()
    }

    /// Items skipped across all categories.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.categories.iter().map(|c| c.walk.skipped).sum()
    }
}

/// Applies the name filter and category cap from `options`.
#[must_use]
pub fn select_categories(links: Vec<CategoryLink>, options: &CrawlOptions) -> Vec<CategoryLink> {
    let wanted: Vec<String> = options
        .categories
        .iter()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let selected = links
        .into_iter()
        .filter(|link| wanted.is_empty() || wanted.contains(&link.name.to_lowercase()));

    match options.max_categories {
        Some(max) => selected.take(max).collect(),
        None => selected.collect(),
    }
}

/// Crawls every selected category of the catalogue.
///
/// The store connection is opened per category and closed when that
/// category's walk ends. A category whose store cannot be opened is logged
/// and skipped; no single category can abort the run.
pub async fn crawl_catalogue<F: PageFetcher>(
    fetcher: &F,
    options: &CrawlOptions,
    csv: &mut CsvSink,
    progress: Arc<dyn ProgressCallback>,
) -> CrawlSummary {
    let mut summary = CrawlSummary::default();

    let base_url = match Url::parse(&options.base_url) {
        Ok(url) => url,
        Err(e) => {
            log::error!("Invalid base URL {:?}: {e}", options.base_url);
            return summary;
        }
    };

    let Some(links) = read_categories(fetcher, &base_url).await else {
        log::error!("Could not read categories from {base_url}");
        return summary;
    };

    let selected = select_categories(links, options);
    log::info!("Crawling {} categories", selected.len());
    progress.set_total(selected.len() as u64);

    for (i, category) in selected.iter().enumerate() {
        log::info!("Scraping category: {}", category.name);
        progress.set_message(category.name.clone());

        match book_db::open(&options.db_path) {
            Ok(conn) => {
                let mut writer = DualSinkWriter::new(csv, &conn);
                let walk = walk_category(fetcher, &category.url, &mut writer, options).await;
                summary.categories.push(CategoryOutcome {
                    name: category.name.clone(),
                    walk,
                });
            }
            Err(e) => {
                log::error!(
                    "Skipping category {}: cannot open {}: {e}",
                    category.name,
                    options.db_path.display()
                );
                summary.failed_categories += 1;
            }
        }

        progress.inc(1);

        if i + 1 < selected.len() && !options.category_delay.is_zero() {
            tokio::time::sleep(options.category_delay).await;
        }
    }

    progress.finish(format!(
        "Crawled {} categories, {} books",
        summary.categories.len(),
        summary.records()
    ));
    log::info!(
        "Crawl complete: {} records, {} skipped items, {} failed categories",
        summary.records(),
        summary.skipped(),
        summary.failed_categories
    );

    summary
}

async fn read_categories<F: PageFetcher>(fetcher: &F, base_url: &Url) -> Option<Vec<CategoryLink>> {
    let document = fetch_document(fetcher, base_url).await?;
    category_links(&document, base_url)
        .map_err(|e| log::error!("Error reading categories: {e}"))
        .ok()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use catalog_scraper::{PageFetcher, ScrapeError, Url};

    /// In-memory site keyed by absolute URL, recording every request.
    #[derive(Default)]
    pub struct FakeSite {
        pages: BTreeMap<String, String>,
        pub(crate) requests: Arc<Mutex<Vec<String>>>,
    }

    impl FakeSite {
        pub fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_owned(), body.to_owned());
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl PageFetcher for FakeSite {
        async fn fetch_html(&self, url: &Url) -> Result<String, ScrapeError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| ScrapeError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    pub fn root_page(categories: &[(&str, &str)]) -> String {
        let links: String = categories
            .iter()
            .map(|(name, href)| format!(r#"<li><a href="{href}">{name}</a></li>"#))
            .collect();
        format!(
            r#"<html><body><div class="side_categories"><ul>
<li><a href="catalogue/category/books_1/index.html">Books</a><ul>{links}</ul></li>
</ul></div></body></html>"#
        )
    }

    pub fn listing_page(items: &[String], has_next: bool) -> String {
        let cards: String = items
            .iter()
            .map(|href| {
                format!(
                    r#"<li><article class="product_pod"><h3><a href="{href}">x</a></h3></article></li>"#
                )
            })
            .collect();
        let next = if has_next {
            r#"<li class="next"><a href="next">next</a></li>"#
        } else {
            ""
        };
        format!(
            r#"<html><body><ol class="row">{cards}</ol><ul class="pager">{next}</ul></body></html>"#
        )
    }

    pub fn product_page(title: &str, upc: &str, availability: u32) -> String {
        let stock = if availability > 0 {
            format!("In stock ({availability} available)")
        } else {
            "Out of stock".to_owned()
        };
        format!(
            r#"<html><body>
<ul class="breadcrumb"><li>Home</li><li>Books</li><li>Poetry</li><li>{title}</li></ul>
<h1>{title}</h1>
<p class="price_color">£10.00</p>
<p class="availability">{stock}</p>
<p class="star-rating Three"></p>
<div id="product_description"></div><p>About {title}.</p>
<table class="table table-striped">
<tr><th>UPC</th><td>{upc}</td></tr>
<tr><th>Product Type</th><td>Books</td></tr>
<tr><th>Price (excl. tax)</th><td>£10.00</td></tr>
<tr><th>Price (incl. tax)</th><td>£10.00</td></tr>
<tr><th>Tax</th><td>£0.00</td></tr>
<tr><th>Number of reviews</th><td>0</td></tr>
</table></body></html>"#
        )
    }
}
