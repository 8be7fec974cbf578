//! Paginated traversal of one category.

use std::time::Duration;

use catalog_book_models::BookRecord;
use catalog_scraper::detail::extract_book;
use catalog_scraper::listing::{ListingPage, page_url, parse_listing};
use catalog_scraper::{PageFetcher, Url, fetch_document};

use crate::CrawlOptions;
use crate::sink::BatchSink;

/// Why a category walk stopped paginating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageStop {
    /// The last fetched page had no `li.next` marker.
    #[default]
    LastPage,
    /// A listing page could not be fetched.
    FetchFailed,
    /// A listing page was fetched but held no item links.
    NoItems,
    /// A page URL could not be built or a listing could not be read.
    Malformed,
}

/// Totals for one category walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Listing pages successfully fetched.
    pub pages: u32,
    /// Item links found across those pages.
    pub items_seen: usize,
    /// Records extracted and handed to the sink.
    pub records: usize,
    /// Items whose detail page could not be fetched or extracted.
    pub skipped: usize,
    /// Sink flushes issued.
    pub flushes: usize,
    /// Why pagination ended.
    pub stop: PageStop,
}

/// Walks every listing page of a category, extracting each item and
/// flushing full batches through `sink`.
///
/// A batch is flushed as soon as it reaches `options.batch_size`, before the
/// next item is fetched; whatever remains is flushed once pagination ends.
/// Item and page faults are logged and skipped; nothing here fails the walk.
pub async fn walk_category<F, S>(
    fetcher: &F,
    category_url: &Url,
    sink: &mut S,
    options: &CrawlOptions,
) -> WalkSummary
where
    F: PageFetcher,
    S: BatchSink + ?Sized,
{
    let batch_size = options.batch_size.max(1);
    let mut summary = WalkSummary::default();
    let mut batch: Vec<BookRecord> = Vec::with_capacity(batch_size);
    let mut page = 1;

    loop {
        let url = match page_url(category_url, page) {
            Ok(url) => url,
            Err(e) => {
                log::error!("Cannot build page {page} of {category_url}: {e}");
                summary.stop = PageStop::Malformed;
                break;
            }
        };

        log::debug!("Scraping page {page}: {url}");

        let listing = match fetch_listing(fetcher, &url).await {
            Ok(listing) => listing,
            Err(stop) => {
                summary.stop = stop;
                break;
            }
        };

        summary.pages += 1;

        if listing.item_urls.is_empty() {
            log::warn!("No items on {url}; stopping category");
            summary.stop = PageStop::NoItems;
            break;
        }
        summary.items_seen += listing.item_urls.len();

        for item_url in &listing.item_urls {
            match fetch_record(fetcher, item_url).await {
                Some(book) => {
                    batch.push(book);
                    summary.records += 1;
                }
                None => {
                    log::warn!("Skipping item {item_url}");
                    summary.skipped += 1;
                }
            }

            if batch.len() >= batch_size {
                sink.flush(&batch);
                summary.flushes += 1;
                batch.clear();
            }

            pause(options.item_delay).await;
        }

        if !listing.has_next {
            summary.stop = PageStop::LastPage;
            break;
        }

        page += 1;
        pause(options.page_delay).await;
    }

    if !batch.is_empty() {
        sink.flush(&batch);
        summary.flushes += 1;
    }

    match summary.stop {
        PageStop::LastPage | PageStop::NoItems => log::info!(
            "Finished {category_url}: {} pages, {} records, {} skipped",
            summary.pages,
            summary.records,
            summary.skipped
        ),
        PageStop::FetchFailed | PageStop::Malformed => log::warn!(
            "Stopped {category_url} early after {} pages ({:?}): {} records, {} skipped",
            summary.pages,
            summary.stop,
            summary.records,
            summary.skipped
        ),
    }

    summary
}

/// Fetches and reads a listing page, reporting a fault as the reason to
/// stop paginating.
async fn fetch_listing<F: PageFetcher>(fetcher: &F, url: &Url) -> Result<ListingPage, PageStop> {
    let document = fetch_document(fetcher, url)
        .await
        .ok_or(PageStop::FetchFailed)?;

    parse_listing(&document, url).map_err(|e| {
        log::error!("Error reading listing {url}: {e}");
        PageStop::Malformed
    })
}

async fn fetch_record<F: PageFetcher>(fetcher: &F, url: &Url) -> Option<BookRecord> {
    let document = fetch_document(fetcher, url).await?;
    extract_book(&document, url.as_str())
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
