#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Offline export of the stored catalogue.
//!
//! Reads the whole `books` table and writes it with human-readable headers,
//! either as CSV under `<export_root>/csv/` or as a single-sheet workbook
//! under `<export_root>/excel/`. Files are named
//! `books_export_<YYYYmmdd_HHMMSS>` so repeated exports never collide.

pub mod csv_export;
pub mod xlsx_export;

use std::path::{Path, PathBuf};

use catalog_book_models::{BookQuery, StoredBook};
use catalog_database::{Connection, DbError, book_db};
use chrono::Local;
use strum_macros::{AsRefStr, Display, EnumString};

/// Errors that can occur while exporting.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Reading the store failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// CSV encoding or write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook error.
    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    /// Comma-separated values.
    Csv,
    /// Excel workbook.
    Xlsx,
    /// Both of the above.
    All,
}

/// Exports the whole store in `format`, returning the files written.
///
/// An empty store writes nothing.
///
/// # Errors
///
/// Returns [`ExportError`] if the store cannot be read or a file cannot be
/// written.
pub fn export(
    conn: &Connection,
    export_root: &Path,
    format: ExportFormat,
) -> Result<Vec<PathBuf>, ExportError> {
    let books = book_db::fetch_books(conn, &BookQuery::default())?;
    if books.is_empty() {
        log::warn!("No data to export");
        return Ok(Vec::new());
    }

    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut written = Vec::new();

    if matches!(format, ExportFormat::Csv | ExportFormat::All) {
        let dir = catalog_database::paths::csv_dir(export_root);
        catalog_database::paths::ensure_dir(&dir)?;
        let path = dir.join(format!("books_export_{stamp}.csv"));
        csv_export::write_csv(&books, &path)?;
        log::info!("Exported {} books to {}", books.len(), path.display());
        written.push(path);
    }

    if matches!(format, ExportFormat::Xlsx | ExportFormat::All) {
        let dir = catalog_database::paths::excel_dir(export_root);
        catalog_database::paths::ensure_dir(&dir)?;
        let path = dir.join(format!("books_export_{stamp}.xlsx"));
        xlsx_export::write_xlsx(&books, &path)?;
        log::info!("Exported {} books to {}", books.len(), path.display());
        written.push(path);
    }

    Ok(written)
}

/// Formats a stored book as one export row, in header order.
#[must_use]
pub fn export_row(stored: &StoredBook) -> [String; 14] {
    let book = &stored.book;
    [
        book.title.clone(),
        book.price.to_string(),
        book.availability.to_string(),
        book.rating.to_string(),
        book.category.clone(),
        book.description.clone(),
        book.upc.clone(),
        book.product_type.clone(),
        book.price_excl_tax.to_string(),
        book.price_incl_tax.to_string(),
        book.tax.to_string(),
        book.num_reviews.to_string(),
        if stored.in_stock { "True" } else { "False" }.to_owned(),
        stored.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use catalog_book_models::{BookRecord, StarRating};
    use catalog_database::{Connection, book_db};

    pub fn seeded_store() -> Connection {
        let conn = book_db::open_in_memory().unwrap();
        let books = [
            ("u1", "Sharp Objects", "Mystery", 47.82, 20),
            ("u2", "Olio, Collected", "Poetry", 23.88, 0),
        ]
        .map(|(upc, title, category, price, availability)| BookRecord {
            title: title.to_owned(),
            price,
            availability,
            rating: StarRating::Four,
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
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn parses_format_names() {
        assert_eq!(ExportFormat::from_str("csv").unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_str("XLSX").unwrap(), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::from_str("all").unwrap(), ExportFormat::All);
        assert!(ExportFormat::from_str("pdf").is_err());
        assert_eq!(ExportFormat::Xlsx.to_string(), "xlsx");
    }

    #[test]
    fn exports_both_formats_into_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let conn = testing::seeded_store();

        let written = export(&conn, tmp.path(), ExportFormat::All).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(written[0].parent().unwrap(), tmp.path().join("csv"));
        assert_eq!(written[1].parent().unwrap(), tmp.path().join("excel"));
        assert!(written.iter().all(|p| p.exists()));
        let name = written[0].file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("books_export_"));
    }

    #[test]
    fn empty_store_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let conn = book_db::open_in_memory().unwrap();

        assert!(export(&conn, tmp.path(), ExportFormat::All).unwrap().is_empty());
        assert!(!tmp.path().join("csv").exists());
    }

    #[test]
    fn row_follows_header_order() {
        let conn = testing::seeded_store();
        let books = book_db::fetch_books(&conn, &BookQuery::default()).unwrap();
        let row = export_row(&books[1]);

        assert_eq!(row[0], "Olio, Collected");
        assert_eq!(row[1], "23.88");
        assert_eq!(row[3], "Four");
        assert_eq!(row[6], "u2");
        assert_eq!(row[12], "False");
        assert_eq!(row[13].len(), "2024-01-01 00:00:00".len());
    }
}
