//! Progress reporting for long crawls.
//!
//! The crawl driver reports through [`ProgressCallback`] so it never
//! depends on a terminal. `catalog_cli_utils` renders it with `indicatif`;
//! library callers and tests use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a running crawl.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of units of work expected.
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Replaces the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the work as complete, leaving `msg` visible.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
