//! Console rendering of stored books.
//!
//! Every function returns the rendered text so the same views serve the
//! one-shot subcommands and the interactive browser.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use catalog_book_models::{BookQuery, CatalogSummary, CategoryStats, StoredBook};
use catalog_database::{Connection, DbError, book_db};
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Style};
use tabled::{Table, Tabled};

/// One line of the books grid.
#[derive(Tabled)]
struct BookRow {
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Rating")]
    rating: String,
    #[tabled(rename = "In Stock")]
    in_stock: &'static str,
    #[tabled(rename = "Availability")]
    availability: u32,
}

impl From<&StoredBook> for BookRow {
    fn from(stored: &StoredBook) -> Self {
        Self {
            title: stored.book.title.clone(),
            price: format_price(stored.book.price),
            category: stored.book.category.clone(),
            rating: stored.book.rating.to_string(),
            in_stock: if stored.in_stock { "Yes" } else { "No" },
            availability: stored.book.availability,
        }
    }
}

/// One line of the per-category statistics grid.
#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Count")]
    count: u64,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
}

impl From<&CategoryStats> for CategoryRow {
    fn from(stats: &CategoryStats) -> Self {
        Self {
            category: stats.category.clone(),
            count: stats.count,
            mean: format!("{:.2}", stats.mean_price),
            min: format!("{:.2}", stats.min_price),
            max: format!("{:.2}", stats.max_price),
        }
    }
}

fn format_price(price: f64) -> String {
    format!("£{price:.2}")
}

/// Renders books as a grid table.
#[must_use]
pub fn books_table(books: &[StoredBook]) -> String {
    let mut table = Table::new(books.iter().map(BookRow::from));
    table.with(Style::ascii());
    table.modify(Columns::new(1..2), Alignment::right());
    table.modify(Columns::new(5..6), Alignment::right());
    table.to_string()
}

/// Renders per-category statistics as a grid table.
#[must_use]
pub fn category_table(stats: &[CategoryStats]) -> String {
    let mut table = Table::new(stats.iter().map(CategoryRow::from));
    table.with(Style::ascii());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

/// Renders whole-table totals.
#[must_use]
pub fn summary_lines(summary: &CatalogSummary) -> String {
    format!(
        "Total books: {}\nAverage price: {}\nCategories: {}",
        summary.total_books,
        format_price(summary.average_price),
        summary.category_count
    )
}

/// Computes totals over a set of books already loaded.
#[must_use]
pub fn summarize(books: &[StoredBook]) -> CatalogSummary {
    let categories: BTreeSet<&str> = books.iter().map(|b| b.book.category.as_str()).collect();
    let total: f64 = books.iter().map(|b| b.book.price).sum();

    #[allow(clippy::cast_precision_loss)]
    let average_price = if books.is_empty() {
        0.0
    } else {
        total / books.len() as f64
    };

    CatalogSummary {
        total_books: books.len() as u64,
        category_count: categories.len() as u64,
        average_price,
    }
}

/// Renders the `stats` view: totals followed by per-category statistics.
///
/// # Errors
///
/// Returns [`DbError`] if the store cannot be read.
pub fn stats(conn: &Connection) -> Result<String, DbError> {
    let summary = book_db::summary(conn)?;
    let per_category = book_db::category_stats(conn)?;

    let mut out = String::new();
    let _ = writeln!(out, "{}", summary_lines(&summary));
    let _ = writeln!(out, "\nPrice statistics by category:");
    let _ = write!(out, "{}", category_table(&per_category));

    Ok(out)
}

/// Renders the `list` view: a "showing N of M" header and the grid.
///
/// # Errors
///
/// Returns [`DbError`] if the store cannot be read.
pub fn list(conn: &Connection, query: &BookQuery) -> Result<String, DbError> {
    let total = book_db::count_matching(conn, query)?;
    let books = book_db::fetch_books(conn, query)?;

    if books.is_empty() {
        return Ok("No books found.".to_owned());
    }

    Ok(format!(
        "Showing {} of {total} books\n{}",
        books.len(),
        books_table(&books)
    ))
}

/// Renders the `search` view: matching books followed by their totals.
///
/// # Errors
///
/// Returns [`DbError`] if the store cannot be read.
pub fn search(conn: &Connection, term: &str, category: Option<&str>) -> Result<String, DbError> {
    let mut query = BookQuery::default().with_title(term);
    if let Some(category) = category {
        query = query.with_category(category);
    }

    let books = book_db::fetch_books(conn, &query)?;
    if books.is_empty() {
        return Ok(format!("No books found matching {term:?}."));
    }

    Ok(format!(
        "Found {} books matching {term:?}\n{}\n\n{}",
        books.len(),
        books_table(&books),
        summary_lines(&summarize(&books))
    ))
}

#[cfg(test)]
mod tests {
    use catalog_book_models::{BookRecord, StarRating};

    use super::*;

    fn store() -> Connection {
        let conn = book_db::open_in_memory().unwrap();
        let books = [
            ("u1", "The Black Maria", "Poetry", 52.15, 1),
            ("u2", "Black Dust", "Mystery", 34.53, 0),
            ("u3", "Olio", "Poetry", 23.88, 4),
        ]
        .map(|(upc, title, category, price, availability)| BookRecord {
            title: title.to_owned(),
            price,
            availability,
            rating: StarRating::Three,
            category: category.to_owned(),
            description: String::new(),
            upc: upc.to_owned(),
            product_type: "Books".to_owned(),
            price_excl_tax: price,
            price_incl_tax: price,
            tax: 0.0,
            num_reviews: 0,
        });
        book_db::upsert_books(&conn, &books).unwrap();
        conn
    }

    #[test]
    fn list_reports_shown_and_total() {
        let conn = store();
        let out = list(&conn, &BookQuery::default().with_limit(2)).unwrap();

        assert!(out.starts_with("Showing 2 of 3 books"));
        assert!(out.contains("£52.15"));
        assert!(out.contains("| Yes"));
        assert!(!out.contains("Olio"));
    }

    #[test]
    fn list_by_category() {
        let conn = store();
        let out = list(&conn, &BookQuery::default().with_category("Mystery")).unwrap();

        assert!(out.starts_with("Showing 1 of 1 books"));
        assert!(out.contains("Black Dust"));
        assert!(out.contains("| No"));
    }

    #[test]
    fn search_is_case_insensitive_with_summary() {
        let conn = store();
        let out = search(&conn, "BLACK", None).unwrap();

        assert!(out.starts_with("Found 2 books"));
        assert!(out.contains("Total books: 2"));
        assert!(out.contains("Average price: £43.34"));
        assert!(out.contains("Categories: 2"));

        let poetry = search(&conn, "black", Some("Poetry")).unwrap();
        assert!(poetry.starts_with("Found 1 books"));

        assert!(search(&conn, "dragon", None).unwrap().starts_with("No books found"));
    }

    #[test]
    fn stats_lists_each_category() {
        let conn = store();
        let out = stats(&conn).unwrap();

        assert!(out.contains("Total books: 3"));
        assert!(out.contains("Mystery"));
        assert!(out.contains("23.88"));
        assert!(out.contains("52.15"));
    }

    #[test]
    fn summarize_empty_is_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_books, 0);
        assert!(summary.average_price.abs() < f64::EPSILON);
    }
}
