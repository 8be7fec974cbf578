//! CSV export.

use std::path::Path;

use catalog_book_models::{EXPORT_HEADERS, StoredBook};

use crate::{ExportError, export_row};

/// Writes `books` to `path` with the human-readable header.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be created or written.
pub fn write_csv(books: &[StoredBook], path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(EXPORT_HEADERS)?;
    for book in books {
        writer.write_record(export_row(book))?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use catalog_book_models::BookQuery;
    use catalog_database::book_db;

    use super::*;
    use crate::testing::seeded_store;

    #[test]
    fn writes_header_and_one_row_per_book() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("books.csv");
        let conn = seeded_store();
        let books = book_db::fetch_books(&conn, &BookQuery::default()).unwrap();

        write_csv(&books, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_owned)
            .collect();
        assert_eq!(headers, EXPORT_HEADERS.map(str::to_owned).to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "Sharp Objects");
        assert_eq!(&rows[1][0], "Olio, Collected");
        assert_eq!(&rows[0][12], "True");
    }
}
