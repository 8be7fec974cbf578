//! Excel workbook export.

use std::path::Path;

use catalog_book_models::{EXPORT_HEADERS, StoredBook};
use rust_xlsxwriter::{Format, Workbook};

use crate::{ExportError, export_row};

/// Sheet name of the exported workbook.
pub const SHEET_NAME: &str = "Books";

/// Extra character width added to every column.
const COLUMN_PADDING: usize = 2;

/// Writes `books` to a single-sheet workbook at `path`.
///
/// Numeric fields are stored as numbers and the stock flag as a boolean.
/// Each column is sized to its longest cell or header plus padding.
///
/// # Errors
///
/// Returns [`ExportError::Xlsx`] if the workbook cannot be built or saved.
pub fn write_xlsx(books: &[StoredBook], path: &Path) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in (0u16..).zip(EXPORT_HEADERS) {
        worksheet.write_string_with_format(0, col, header, &header_format)?;
    }

    for (row, stored) in (1u32..).zip(books) {
        let book = &stored.book;
        worksheet.write_string(row, 0, &book.title)?;
        worksheet.write_number(row, 1, book.price)?;
        worksheet.write_number(row, 2, book.availability)?;
        worksheet.write_string(row, 3, book.rating.to_string())?;
        worksheet.write_string(row, 4, &book.category)?;
        worksheet.write_string(row, 5, &book.description)?;
        worksheet.write_string(row, 6, &book.upc)?;
        worksheet.write_string(row, 7, &book.product_type)?;
        worksheet.write_number(row, 8, book.price_excl_tax)?;
        worksheet.write_number(row, 9, book.price_incl_tax)?;
        worksheet.write_number(row, 10, book.tax)?;
        worksheet.write_number(row, 11, book.num_reviews)?;
        worksheet.write_boolean(row, 12, stored.in_stock)?;
        worksheet.write_string(
            row,
            13,
            stored.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        )?;
    }

    for (col, width) in (0u16..).zip(column_widths(books)) {
        #[allow(clippy::cast_precision_loss)]
        worksheet.set_column_width(col, width as f64)?;
    }

    workbook.save(path)?;

    Ok(())
}

/// Returns `max(longest cell, header) + padding` for each column.
fn column_widths(books: &[StoredBook]) -> [usize; 14] {
    let mut widths = EXPORT_HEADERS.map(|h| h.chars().count());

    for book in books {
        for (width, cell) in widths.iter_mut().zip(export_row(book)) {
            *width = (*width).max(cell.chars().count());
        }
    }

    widths.map(|w| w + COLUMN_PADDING)
}
