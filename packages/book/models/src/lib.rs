#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Book record schema shared across the catalogue toolchain.
//!
//! [`BookRecord`] is the transient shape produced by the scraper for one
//! catalogue item. [`StoredBook`] is the same record as read back from the
//! `books` table, with its surrogate id and write timestamps. The field-name
//! lists used by the live CSV sink and the offline export live here too so
//! every writer agrees on column order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Column names of the live CSV sink, in row order.
pub const CSV_FIELDS: [&str; 13] = [
    "title",
    "price",
    "availability",
    "rating",
    "category",
    "description",
    "upc",
    "product_type",
    "price_excl_tax",
    "price_incl_tax",
    "tax",
    "num_reviews",
    "in_stock",
];

/// Human-readable column headers used by the offline CSV/XLSX exports.
pub const EXPORT_HEADERS: [&str; 14] = [
    "Title",
    "Price",
    "Availability",
    "Rating",
    "Category",
    "Description",
    "UPC",
    "Product Type",
    "Price (excl. tax)",
    "Price (incl. tax)",
    "Tax",
    "Number of Reviews",
    "In Stock",
    "Last Updated",
];

/// Star rating shown on a product page, from one to five stars.
///
/// The site encodes the rating as the second class token of the rating
/// element (`star-rating Three`), so the string form is the bare word.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum StarRating {
    /// One star
    One = 1,
    /// Two stars
    Two = 2,
    /// Three stars
    Three = 3,
    /// Four stars
    Four = 4,
    /// Five stars
    Five = 5,
}

impl StarRating {
    /// Returns the number of stars.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }
}

/// One catalogue item as extracted from its detail page.
///
/// `in_stock` is not stored on the record; it is always derived from
/// [`Self::availability`] through [`Self::in_stock()`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Book title.
    pub title: String,
    /// Listed price.
    pub price: f64,
    /// Number of copies in stock.
    pub availability: u32,
    /// Star rating.
    pub rating: StarRating,
    /// Catalogue category (taxonomy leaf).
    pub category: String,
    /// Product description, empty when the page has none.
    pub description: String,
    /// Universal product code, the natural key.
    pub upc: String,
    /// Product type label (e.g. "Books").
    pub product_type: String,
    /// Price excluding tax.
    pub price_excl_tax: f64,
    /// Price including tax.
    pub price_incl_tax: f64,
    /// Tax amount.
    pub tax: f64,
    /// Number of customer reviews.
    pub num_reviews: u32,
}

impl BookRecord {
    /// Whether at least one copy is available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.availability > 0
    }

    /// Returns the record as one live-CSV row, in [`CSV_FIELDS`] order.
    ///
    /// Booleans are spelled `True`/`False`.
    #[must_use]
    pub fn csv_row(&self) -> [String; 13] {
        [
            self.title.clone(),
            self.price.to_string(),
            self.availability.to_string(),
            self.rating.to_string(),
            self.category.clone(),
            self.description.clone(),
            self.upc.clone(),
            self.product_type.clone(),
            self.price_excl_tax.to_string(),
            self.price_incl_tax.to_string(),
            self.tax.to_string(),
            self.num_reviews.to_string(),
            if self.in_stock() { "True" } else { "False" }.to_string(),
        ]
    }
}

/// A row of the `books` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBook {
    /// Surrogate primary key.
    pub id: i64,
    /// The stored record.
    pub book: BookRecord,
    /// Stored `in_stock` column (always `book.availability > 0`).
    pub in_stock: bool,
    /// When the row was first inserted.
    pub created_at: DateTime<Utc>,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

/// Filters for read-only book listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookQuery {
    /// Case-insensitive title substring.
    pub title_contains: Option<String>,
    /// Exact category name.
    pub category: Option<String>,
    /// Maximum number of rows to return.
    pub limit: Option<u32>,
}

impl BookQuery {
    /// Restricts results to titles containing `term` (case-insensitive).
    #[must_use]
    pub fn with_title(mut self, term: &str) -> Self {
        self.title_contains = Some(term.to_owned());
        self
    }

    /// Restricts results to one exact category.
    #[must_use]
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_owned());
        self
    }

    /// Caps the number of rows returned.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Price statistics for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Category name.
    pub category: String,
    /// Number of books.
    pub count: u64,
    /// Mean price.
    pub mean_price: f64,
    /// Lowest price.
    pub min_price: f64,
    /// Highest price.
    pub max_price: f64,
}

/// Whole-table summary used by the console viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSummary {
    /// Total number of books.
    pub total_books: u64,
    /// Number of distinct categories.
    pub category_count: u64,
    /// Mean price over all books (0.0 when empty).
    pub average_price: f64,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    fn sample(availability: u32) -> BookRecord {
        BookRecord {
            title: "A Light in the Attic".to_owned(),
            price: 51.77,
            availability,
            rating: StarRating::Three,
            category: "Poetry".to_owned(),
            description: String::new(),
            upc: "a897fe39b1053632".to_owned(),
            product_type: "Books".to_owned(),
            price_excl_tax: 51.77,
            price_incl_tax: 51.77,
            tax: 0.0,
            num_reviews: 0,
        }
    }

    #[test]
    fn rating_parses_class_token() {
        assert_eq!(StarRating::from_str("Three").unwrap(), StarRating::Three);
        assert_eq!(StarRating::Five.value(), 5);
        assert!(StarRating::from_str("Zero").is_err());
    }

    #[test]
    fn in_stock_follows_availability() {
        assert!(sample(22).in_stock());
        assert!(!sample(0).in_stock());
    }

    #[test]
    fn csv_row_matches_field_order() {
        let row = sample(0).csv_row();
        assert_eq!(row.len(), CSV_FIELDS.len());
        assert_eq!(row[0], "A Light in the Attic");
        assert_eq!(row[1], "51.77");
        assert_eq!(row[3], "Three");
        assert_eq!(row[6], "a897fe39b1053632");
        assert_eq!(row[12], "False");
    }
}
