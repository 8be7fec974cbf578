//! Batch sinks for crawled records.
//!
//! The walker hands every full (or final partial) batch to a [`BatchSink`].
//! [`DualSinkWriter`] fans each batch out to the run's live CSV file and to
//! the `books` table. The two targets are independent: a fault in one is
//! logged and never rolls back or retries the other.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use catalog_book_models::{BookRecord, CSV_FIELDS};
use catalog_database::Connection;
use catalog_database::book_db;
use chrono::Local;

/// Errors that can occur while writing the live CSV file.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// CSV encoding or write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives batches of records from the walker.
///
/// Implementations log their own faults; a flush never fails the crawl.
pub trait BatchSink {
    /// Persists one batch.
    fn flush(&mut self, batch: &[BookRecord]);
}

/// Whether the live CSV file already carries its header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderState {
    /// Nothing has reached the file yet.
    Pending,
    /// The header row has been written.
    Written,
}

/// Append-only CSV file for one crawl run.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    header: HeaderState,
}

impl CsvSink {
    /// Creates a sink that appends to `path`, writing the header on the
    /// first flush.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            header: HeaderState::Pending,
        }
    }

    /// Creates a sink for a new run under `<export_root>/csv/`, named
    /// `books_live_export_<YYYYmmdd_HHMMSS>.csv`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Io`] if the directory cannot be created.
    pub fn for_run(export_root: &Path) -> Result<Self, SinkError> {
        let dir = catalog_database::paths::csv_dir(export_root);
        catalog_database::paths::ensure_dir(&dir)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        Ok(Self::new(dir.join(format!("books_live_export_{stamp}.csv"))))
    }

    /// Path of the live file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current header state.
    #[must_use]
    pub const fn header_state(&self) -> HeaderState {
        self.header
    }

    /// Appends `batch` to the file, preceded by the header if it has not
    /// been written yet.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the file cannot be opened or written.
    pub fn write_batch(&mut self, batch: &[BookRecord]) -> Result<(), SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if self.header == HeaderState::Pending {
            writer.write_record(CSV_FIELDS)?;
            writer.flush()?;
            self.header = HeaderState::Written;
        }

        for book in batch {
            writer.write_record(book.csv_row())?;
        }
        writer.flush()?;

        Ok(())
    }
}

impl BatchSink for CsvSink {
    fn flush(&mut self, batch: &[BookRecord]) {
        match self.write_batch(batch) {
            Ok(()) => log::debug!(
                "Appended {} records to {}",
                batch.len(),
                self.path.display()
            ),
            Err(e) => log::error!("Error writing to CSV {}: {e}", self.path.display()),
        }
    }
}

/// Writes each batch to the live CSV file and upserts it into the store.
pub struct DualSinkWriter<'a> {
    csv: &'a mut CsvSink,
    conn: &'a Connection,
}

impl<'a> DualSinkWriter<'a> {
    /// Combines the run's CSV sink with a store connection.
    pub const fn new(csv: &'a mut CsvSink, conn: &'a Connection) -> Self {
        Self { csv, conn }
    }
}

impl BatchSink for DualSinkWriter<'_> {
    fn flush(&mut self, batch: &[BookRecord]) {
        self.csv.flush(batch);

        match book_db::upsert_books(self.conn, batch) {
            Ok(report) => log::info!(
                "Saved batch of {} books to database ({} written, {} skipped, {} failed)",
                batch.len(),
                report.written,
                report.skipped,
                report.failed
            ),
            Err(e) => log::error!("Error saving batch to database: {e}"),
        }
    }
}
