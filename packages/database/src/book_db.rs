//! `DuckDB` storage for scraped books.
//!
//! One `books` table keyed by a sequence-backed surrogate id, with `upc`
//! as the unique natural key. Writers upsert by `upc`; everything else in
//! this module is read-only.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr as _;

use catalog_book_models::{
    BookQuery, BookRecord, CatalogSummary, CategoryStats, StarRating, StoredBook,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Connection;

use crate::DbError;

const UPSERT_SQL: &str = "INSERT INTO books (
        title, price, availability, rating, category, description, upc,
        product_type, price_excl_tax, price_incl_tax, tax, num_reviews,
        in_stock, created_at, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (upc) DO UPDATE SET
        title = EXCLUDED.title,
        price = EXCLUDED.price,
        availability = EXCLUDED.availability,
        rating = EXCLUDED.rating,
        category = EXCLUDED.category,
        description = EXCLUDED.description,
        product_type = EXCLUDED.product_type,
        price_excl_tax = EXCLUDED.price_excl_tax,
        price_incl_tax = EXCLUDED.price_incl_tax,
        tax = EXCLUDED.tax,
        num_reviews = EXCLUDED.num_reviews,
        in_stock = EXCLUDED.in_stock,
        updated_at = EXCLUDED.updated_at";

const SELECT_COLUMNS: &str = "id, title, price, availability, rating, category, description,
    upc, product_type, price_excl_tax, price_incl_tax, tax, num_reviews, in_stock,
    created_at::TEXT, updated_at::TEXT";

/// Outcome of one batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Rows inserted or updated.
    pub written: usize,
    /// Records skipped before reaching the database (no `upc`).
    pub skipped: usize,
    /// Records the database rejected.
    pub failed: usize,
}

/// Opens (or creates) the books database and ensures the schema exists.
///
/// The returned [`Connection`] is closed when dropped.
///
/// # Errors
///
/// Returns [`DbError`] if the directory, connection or schema creation
/// fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    log::debug!("Opened books database at {}", path.display());

    Ok(conn)
}

/// Opens a throwaway in-memory database with the books schema.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS books_id_seq START 1;

        CREATE TABLE IF NOT EXISTS books (
            id BIGINT PRIMARY KEY DEFAULT nextval('books_id_seq'),
            title TEXT NOT NULL,
            price DOUBLE NOT NULL,
            availability BIGINT NOT NULL,
            rating TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL,
            upc TEXT NOT NULL UNIQUE,
            product_type TEXT NOT NULL,
            price_excl_tax DOUBLE NOT NULL,
            price_incl_tax DOUBLE NOT NULL,
            tax DOUBLE NOT NULL,
            num_reviews BIGINT NOT NULL,
            in_stock BOOLEAN NOT NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        );",
    )?;

    Ok(())
}

/// Upserts a batch of books by `upc` and commits once.
///
/// Records without a `upc` are skipped with a warning. Duplicate `upc`s
/// within the batch collapse to their last occurrence. If the database
/// rejects a record, the error is logged, the transaction is rolled back
/// and the batch is replayed without that record, so every other record
/// still commits.
///
/// # Errors
///
/// Returns [`DbError`] if the transaction itself cannot be started,
/// committed or rolled back.
pub fn upsert_books(conn: &Connection, books: &[BookRecord]) -> Result<UpsertReport, DbError> {
    let mut report = UpsertReport::default();

    let mut last_seen: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, book) in books.iter().enumerate() {
        if book.upc.is_empty() {
            log::warn!("Skipping book {:?}: no UPC to key on", book.title);
            report.skipped += 1;
        } else {
            last_seen.insert(&book.upc, i);
        }
    }
    let mut pending: Vec<&BookRecord> = books
        .iter()
        .enumerate()
        .filter(|(i, book)| last_seen.get(book.upc.as_str()) == Some(i))
        .map(|(_, book)| book)
        .collect();

    let mut stmt = conn.prepare(UPSERT_SQL)?;

    while !pending.is_empty() {
        let now = format_timestamp(Utc::now());

        conn.execute_batch("BEGIN TRANSACTION")?;
        let rejected = pending.iter().position(|book| {
            match stmt.execute(duckdb::params![
                book.title,
                book.price,
                i64::from(book.availability),
                book.rating.to_string(),
                book.category,
                book.description,
                book.upc,
                book.product_type,
                book.price_excl_tax,
                book.price_incl_tax,
                book.tax,
                i64::from(book.num_reviews),
                book.in_stock(),
                now,
                now,
            ]) {
                Ok(_) => false,
                Err(e) => {
                    log::error!("DB error for book {:?}: {e}", book.title);
                    true
                }
            }
        });

        match rejected {
            None => {
                conn.execute_batch("COMMIT")?;
                report.written += pending.len();
                break;
            }
            Some(i) => {
                conn.execute_batch("ROLLBACK")?;
                pending.remove(i);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Returns the number of stored books.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn count_books(conn: &Connection) -> Result<u64, DbError> {
    count_matching(conn, &BookQuery::default())
}

/// Returns the number of books matching `query`, ignoring its limit.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn count_matching(conn: &Connection, query: &BookQuery) -> Result<u64, DbError> {
    let (where_sql, params) = filter_clause(query);
    let mut stmt = conn.prepare(&format!("SELECT COUNT(*) FROM books{where_sql}"))?;
    let count: i64 = stmt.query_row(duckdb::params_from_iter(params.iter()), |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Returns stored books matching `query`, in insertion order.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored row cannot be
/// converted back into a [`StoredBook`].
pub fn fetch_books(conn: &Connection, query: &BookQuery) -> Result<Vec<StoredBook>, DbError> {
    let (where_sql, params) = filter_clause(query);
    let limit_sql = query
        .limit
        .map_or_else(String::new, |limit| format!(" LIMIT {limit}"));

    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM books{where_sql} ORDER BY id{limit_sql}"
    ))?;

    let rows = stmt.query_map(duckdb::params_from_iter(params.iter()), |row| {
        Ok(RawBook {
            id: row.get(0)?,
            title: row.get(1)?,
            price: row.get(2)?,
            availability: row.get(3)?,
            rating: row.get(4)?,
            category: row.get(5)?,
            description: row.get(6)?,
            upc: row.get(7)?,
            product_type: row.get(8)?,
            price_excl_tax: row.get(9)?,
            price_incl_tax: row.get(10)?,
            tax: row.get(11)?,
            num_reviews: row.get(12)?,
            in_stock: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    })?;

    rows.map(|row| row?.into_stored())
        .collect::<Result<Vec<_>, DbError>>()
}

/// Returns a stored book by its `upc`, if present.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_by_upc(conn: &Connection, upc: &str) -> Result<Option<StoredBook>, DbError> {
    let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM books WHERE upc = ?"))?;
    let raw = stmt.query_row([upc], |row| {
        Ok(RawBook {
            id: row.get(0)?,
            title: row.get(1)?,
            price: row.get(2)?,
            availability: row.get(3)?,
            rating: row.get(4)?,
            category: row.get(5)?,
            description: row.get(6)?,
            upc: row.get(7)?,
            product_type: row.get(8)?,
            price_excl_tax: row.get(9)?,
            price_incl_tax: row.get(10)?,
            tax: row.get(11)?,
            num_reviews: row.get(12)?,
            in_stock: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    });

    match raw {
        Ok(raw) => raw.into_stored().map(Some),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::DuckDb(e)),
    }
}

/// Returns the distinct category names, sorted.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn categories(conn: &Connection) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare("SELECT DISTINCT category FROM books ORDER BY category")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<Result<Vec<String>, _>>()?)
}

/// Returns book counts and price statistics per category, sorted by name.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn category_stats(conn: &Connection) -> Result<Vec<CategoryStats>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT category, COUNT(*), AVG(price), MIN(price), MAX(price)
         FROM books
         GROUP BY category
         ORDER BY category",
    )?;
    let rows = stmt.query_map([], |row| {
        let count: i64 = row.get(1)?;
        Ok(CategoryStats {
            category: row.get(0)?,
            count: u64::try_from(count).unwrap_or(0),
            mean_price: row.get(2)?,
            min_price: row.get(3)?,
            max_price: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Returns whole-table totals.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn summary(conn: &Connection) -> Result<CatalogSummary, DbError> {
    let mut stmt = conn.prepare(
        "SELECT COUNT(*), COUNT(DISTINCT category), COALESCE(AVG(price), 0.0) FROM books",
    )?;
    let (total, categories, average_price): (i64, i64, f64) =
        stmt.query_row([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;

    Ok(CatalogSummary {
        total_books: u64::try_from(total).unwrap_or(0),
        category_count: u64::try_from(categories).unwrap_or(0),
        average_price,
    })
}

/// Builds the `WHERE` clause and its bound values for a [`BookQuery`].
fn filter_clause(query: &BookQuery) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(term) = query.title_contains.as_deref().filter(|t| !t.is_empty()) {
        conditions.push("contains(lower(title), lower(?))");
        params.push(term.to_owned());
    }
    if let Some(category) = query.category.as_deref() {
        conditions.push("category = ?");
        params.push(category.to_owned());
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

/// A `books` row with its columns in storage types.
struct RawBook {
    id: i64,
    title: String,
    price: f64,
    availability: i64,
    rating: String,
    category: String,
    description: String,
    upc: String,
    product_type: String,
    price_excl_tax: f64,
    price_incl_tax: f64,
    tax: f64,
    num_reviews: i64,
    in_stock: bool,
    created_at: String,
    updated_at: String,
}

impl RawBook {
    fn into_stored(self) -> Result<StoredBook, DbError> {
        let conversion = |message: String| DbError::Conversion { message };

        let rating = StarRating::from_str(&self.rating)
            .map_err(|_| conversion(format!("invalid rating {:?}", self.rating)))?;
        let availability = u32::try_from(self.availability)
            .map_err(|_| conversion(format!("invalid availability {}", self.availability)))?;
        let num_reviews = u32::try_from(self.num_reviews)
            .map_err(|_| conversion(format!("invalid review count {}", self.num_reviews)))?;
        let created_at = parse_timestamp(&self.created_at)
            .ok_or_else(|| conversion(format!("invalid created_at {:?}", self.created_at)))?;
        let updated_at = parse_timestamp(&self.updated_at)
            .ok_or_else(|| conversion(format!("invalid updated_at {:?}", self.updated_at)))?;

        Ok(StoredBook {
            id: self.id,
            book: BookRecord {
                title: self.title,
                price: self.price,
                availability,
                rating,
                category: self.category,
                description: self.description,
                upc: self.upc,
                product_type: self.product_type,
                price_excl_tax: self.price_excl_tax,
                price_incl_tax: self.price_incl_tax,
                tax: self.tax,
                num_reviews,
            },
            in_stock: self.in_stock,
            created_at,
            updated_at,
        })
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Parses a `DuckDB` `TIMESTAMP::TEXT` value (with or without fractional
/// seconds) as UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }

    log::warn!("Failed to parse timestamp: {s:?}");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(upc: &str, title: &str, category: &str, price: f64, availability: u32) -> BookRecord {
        BookRecord {
            title: title.to_owned(),
            price,
            availability,
            rating: StarRating::Four,
            category: category.to_owned(),
            description: "A book.".to_owned(),
            upc: upc.to_owned(),
            product_type: "Books".to_owned(),
            price_excl_tax: price,
            price_incl_tax: price,
            tax: 0.0,
            num_reviews: 0,
        }
    }

    #[test]
    fn upsert_inserts_new_rows() {
        let conn = open_in_memory().unwrap();
        let report = upsert_books(
            &conn,
            &[
                book("u1", "Sharp Objects", "Mystery", 47.82, 20),
                book("u2", "Sapiens", "History", 54.23, 0),
            ],
        )
        .unwrap();

        assert_eq!(report.written, 2);
        assert_eq!(count_books(&conn).unwrap(), 2);

        let stored = get_by_upc(&conn, "u2").unwrap().unwrap();
        assert_eq!(stored.book.title, "Sapiens");
        assert_eq!(stored.book.rating, StarRating::Four);
        assert!(!stored.in_stock);
        assert_eq!(stored.in_stock, stored.book.in_stock());
    }

    #[test]
    fn upsert_overwrites_existing_upc_in_place() {
        let conn = open_in_memory().unwrap();
        upsert_books(&conn, &[book("u1", "Sharp Objects", "Mystery", 47.82, 20)]).unwrap();
        let before = get_by_upc(&conn, "u1").unwrap().unwrap();

        let report =
            upsert_books(&conn, &[book("u1", "Sharp Objects (2nd ed.)", "Mystery", 12.5, 0)])
                .unwrap();

        assert_eq!(report.written, 1);
        assert_eq!(count_books(&conn).unwrap(), 1);

        let after = get_by_upc(&conn, "u1").unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.book.title, "Sharp Objects (2nd ed.)");
        assert!((after.book.price - 12.5).abs() < f64::EPSILON);
        assert!(!after.in_stock);
    }

    #[test]
    fn upsert_skips_missing_upc_and_collapses_duplicates() {
        let conn = open_in_memory().unwrap();
        let report = upsert_books(
            &conn,
            &[
                book("", "No Key", "Poetry", 1.0, 1),
                book("u1", "First", "Poetry", 1.0, 1),
                book("u1", "Second", "Poetry", 2.0, 1),
            ],
        )
        .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.written, 1);
        assert_eq!(count_books(&conn).unwrap(), 1);
        assert_eq!(get_by_upc(&conn, "u1").unwrap().unwrap().book.title, "Second");
    }

    #[test]
    fn filters_by_title_and_category() {
        let conn = open_in_memory().unwrap();
        upsert_books(
            &conn,
            &[
                book("u1", "The Black Maria", "Poetry", 52.15, 1),
                book("u2", "Black Dust", "Mystery", 34.53, 1),
                book("u3", "Olio", "Poetry", 23.88, 0),
            ],
        )
        .unwrap();

        let black = fetch_books(&conn, &BookQuery::default().with_title("BLACK")).unwrap();
        assert_eq!(black.len(), 2);

        let poetry_black = BookQuery::default()
            .with_title("black")
            .with_category("Poetry");
        let rows = fetch_books(&conn, &poetry_black).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].book.upc, "u1");
        assert_eq!(count_matching(&conn, &poetry_black).unwrap(), 1);

        let limited = fetch_books(&conn, &BookQuery::default().with_limit(2)).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(count_matching(&conn, &BookQuery::default().with_limit(2)).unwrap(), 3);
    }

    #[test]
    fn aggregates_statistics() {
        let conn = open_in_memory().unwrap();
        upsert_books(
            &conn,
            &[
                book("u1", "A", "Poetry", 10.0, 1),
                book("u2", "B", "Poetry", 20.0, 1),
                book("u3", "C", "Travel", 30.0, 0),
            ],
        )
        .unwrap();

        assert_eq!(categories(&conn).unwrap(), vec!["Poetry", "Travel"]);

        let stats = category_stats(&conn).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].category, "Poetry");
        assert_eq!(stats[0].count, 2);
        assert!((stats[0].mean_price - 15.0).abs() < 1e-9);
        assert!((stats[0].min_price - 10.0).abs() < 1e-9);
        assert!((stats[0].max_price - 20.0).abs() < 1e-9);

        let summary = summary(&conn).unwrap();
        assert_eq!(summary.total_books, 3);
        assert_eq!(summary.category_count, 2);
        assert!((summary.average_price - 20.0).abs() < 1e-9);
    }

    #[test]
    fn empty_store_summary_is_zero() {
        let conn = open_in_memory().unwrap();
        let summary = summary(&conn).unwrap();
        assert_eq!(summary.total_books, 0);
        assert!(summary.average_price.abs() < f64::EPSILON);
    }

    #[test]
    fn reopens_file_database() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/books.duckdb");

        {
            let conn = open(&path).unwrap();
            upsert_books(&conn, &[book("u1", "Olio", "Poetry", 23.88, 1)]).unwrap();
        }

        let conn = open(&path).unwrap();
        assert_eq!(count_books(&conn).unwrap(), 1);
    }

    #[test]
    fn parses_duckdb_timestamp_text() {
        assert!(parse_timestamp("2024-01-15 10:30:00").is_some());
        assert!(parse_timestamp("2024-01-15 10:30:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
