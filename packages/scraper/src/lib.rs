#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Page fetching and product-page extraction for the book catalogue.
//!
//! [`PageFetcher`] is the single network seam: [`HttpFetcher`] implements it
//! with `reqwest`, and tests substitute an in-memory site. Everything above
//! the fetcher works on parsed [`scraper::Html`] documents:
//!
//! - [`detail`] turns a product page into a [`catalog_book_models::BookRecord`]
//! - [`listing`] reads category listings and the navigation sidebar
//! - [`parsing`] holds the lossy field parsers (prices, counts)

pub mod detail;
pub mod listing;
pub mod parsing;
pub mod progress;

use scraper::{Html, Selector};

pub use url::Url;

/// Desktop Chrome user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Errors that can occur while fetching or extracting pages.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP status {status} for {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// A URL could not be parsed or resolved.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A required element is missing from the document.
    #[error("Missing element: {0}")]
    MissingElement(&'static str),

    /// Parsing the document failed.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Fetches raw page bodies.
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] on network faults or non-2xx responses.
    fn fetch_html(
        &self,
        url: &Url,
    ) -> impl std::future::Future<Output = Result<String, ScrapeError>> + Send;
}

/// [`PageFetcher`] backed by a shared `reqwest` client with a fixed
/// `User-Agent` header.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a fetcher that sends [`DEFAULT_USER_AGENT`].
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, ScrapeError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Builds a fetcher that sends the given `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the header value is invalid or the HTTP
    /// client cannot be built.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, ScrapeError> {
        let mut header_map = reqwest::header::HeaderMap::new();
        let value = reqwest::header::HeaderValue::from_str(user_agent).map_err(|e| {
            ScrapeError::Parse(format!("invalid user agent '{user_agent}': {e}"))
        })?;
        header_map.insert(reqwest::header::USER_AGENT, value);

        let client = reqwest::Client::builder()
            .default_headers(header_map)
            .build()?;

        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch_html(&self, url: &Url) -> Result<String, ScrapeError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Fetches and parses a page, logging any fault.
///
/// Returns `None` instead of an error so callers can treat a failed fetch
/// as "no document".
pub async fn fetch_document(fetcher: &impl PageFetcher, url: &Url) -> Option<Html> {
    log::debug!("Fetching {url}");
    match fetcher.fetch_html(url).await {
        Ok(body) => Some(Html::parse_document(&body)),
        Err(e) => {
            log::error!("Error fetching {url}: {e}");
            None
        }
    }
}

/// Parses a CSS selector string, returning a [`ScrapeError`] on failure.
pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector)
        .map_err(|e| ScrapeError::Parse(format!("invalid CSS selector '{selector}': {e}")))
}

/// Collects the trimmed text content of an element.
pub(crate) fn element_text(element: scraper::ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::{PageFetcher, ScrapeError, Url};

    /// In-memory site keyed by absolute URL.
    #[derive(Default)]
    pub struct StaticSite {
        pages: BTreeMap<String, String>,
        pub requests: Mutex<Vec<String>>,
    }

    impl StaticSite {
        pub fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_owned(), body.to_owned());
            self
        }
    }

    impl PageFetcher for StaticSite {
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
}
