//! Category listing and sidebar parsing.
//!
//! Listing pages link each item through the `<h3><a href>` title of its
//! `article.product_pod` card and mark the existence of a following page
//! with `li.next`. Page 1 of a category is its `index.html`; page `N` is
//! the sibling file `page-N.html`.

use scraper::Html;
use url::Url;

use crate::{ScrapeError, element_text, parse_selector};

/// One entry of the navigation sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryLink {
    /// Category name as shown in the sidebar.
    pub name: String,
    /// Absolute URL of the category's first listing page.
    pub url: Url,
}

/// Items and pagination state read from one listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    /// Absolute detail-page URLs, in page order.
    pub item_urls: Vec<Url>,
    /// Whether the page carries a "next" link.
    pub has_next: bool,
}

/// Returns the URL of listing page `page` (1-based) for a category.
///
/// # Errors
///
/// Returns [`ScrapeError::InvalidUrl`] if the page URL cannot be resolved.
pub fn page_url(category_url: &Url, page: u32) -> Result<Url, ScrapeError> {
    if page <= 1 {
        return Ok(category_url.clone());
    }
    Ok(category_url.join(&format!("page-{page}.html"))?)
}

/// Reads item links and the pagination terminator from a listing page.
///
/// Links are resolved against `page_url`; a link that cannot be resolved
/// is logged and left out.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] if a selector fails to compile.
pub fn parse_listing(document: &Html, page_url: &Url) -> Result<ListingPage, ScrapeError> {
    let link_sel = parse_selector("article.product_pod h3 a[href]")?;
    let next_sel = parse_selector("li.next")?;

    let item_urls = document
        .select(&link_sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| match page_url.join(href) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("Skipping unresolvable item link {href:?} on {page_url}: {e}");
                None
            }
        })
        .collect();

    let has_next = document.select(&next_sel).next().is_some();

    Ok(ListingPage {
        item_urls,
        has_next,
    })
}

/// Reads the sidebar category list from the site root.
///
/// The first sidebar entry is the aggregate "Books" pseudo-category and is
/// skipped.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] if a selector fails to compile.
pub fn category_links(document: &Html, base_url: &Url) -> Result<Vec<CategoryLink>, ScrapeError> {
    let link_sel = parse_selector("div.side_categories a[href]")?;

    let links: Vec<CategoryLink> = document
        .select(&link_sel)
        .skip(1)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            match base_url.join(href) {
                Ok(url) => Some(CategoryLink {
                    name: element_text(a),
                    url,
                }),
                Err(e) => {
                    log::warn!("Skipping unresolvable category link {href:?}: {e}");
                    None
                }
            }
        })
        .collect();

    if links.is_empty() {
        log::warn!("No categories found in the sidebar of {base_url}");
    }

    Ok(links)
}
