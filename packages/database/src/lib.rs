#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` storage for scraped books.
//!
//! The store is a single `books` table keyed by a surrogate id with a
//! unique `upc`. [`book_db`] owns the schema, the batch upsert used by the
//! crawler and the read-only queries used by the viewer and exporters.
//! [`paths`] resolves the default locations of the database file and the
//! export directories.

pub mod book_db;
pub mod paths;

pub use duckdb::Connection;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// File system error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
