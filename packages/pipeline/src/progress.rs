//! Progress reporting for pipeline stages.
//!
//! Stages report through [`ProgressCallback`] and never see how progress is
//! drawn. A [`ProgressReporter`] creates one callback per stage; the CLI
//! backs it with `indicatif` bars, tests use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from one stage.
pub trait ProgressCallback: Send + Sync {
    /// Number of locations or groups the stage will process.
    fn set_total(&self, total: u64);

    fn inc(&self, delta: u64);

    /// Text shown next to the indicator, usually the item in progress.
    fn set_message(&self, msg: String);

    fn finish(&self, msg: String);

    /// Finishes and removes the indicator.
    fn finish_and_clear(&self);
}

/// Creates a progress callback for each stage of a run.
pub trait ProgressReporter: Send + Sync {
    /// Starts reporting for a stage labelled `message`.
    fn stage(&self, message: &str) -> Arc<dyn ProgressCallback>;
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

impl ProgressReporter for NullProgress {
    fn stage(&self, _message: &str) -> Arc<dyn ProgressCallback> {
        null_progress()
    }
}

/// A shared [`NullProgress`] callback.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
