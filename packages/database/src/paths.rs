#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the catalogue's data and export directories.
//!
//! Defaults are relative to the workspace root; the CLI lets every one of
//! them be overridden by flag or environment variable.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`, falling back to the
/// current directory when the manifest is not nested as expected.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the default `DuckDB` file for scraped books.
#[must_use]
pub fn default_db_path() -> PathBuf {
    data_dir().join("books.duckdb")
}

/// Returns the `csv/` subdirectory of an export root.
#[must_use]
pub fn csv_dir(export_root: &Path) -> PathBuf {
    export_root.join("csv")
}

/// Returns the `excel/` subdirectory of an export root.
#[must_use]
pub fn excel_dir(export_root: &Path) -> PathBuf {
    export_root.join("excel")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
