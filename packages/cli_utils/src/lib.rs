#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Terminal plumbing for the `group_scout` binary.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge`, so log lines printed during a run do not tear the
//! progress bars. [`IndicatifReporter`] gives each pipeline stage its own
//! bar on a shared [`MultiProgress`].

use std::sync::Arc;
use std::time::Duration;

use group_scout_pipeline::progress::{ProgressCallback, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied once `set_total()` says how much work there is.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// A bar for one pipeline stage. Spins until the stage knows how many
    /// locations or groups it will process, then shows position and ETA.
    #[must_use]
    pub fn stage_bar(multi: &MultiProgress, message: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {prefix} {wide_bar:.cyan/dim} {pos}/{len} [{eta}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Self { bar, bar_style }
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Hands out one [`IndicatifProgress`] bar per pipeline stage.
#[derive(Clone)]
pub struct IndicatifReporter {
    multi: MultiProgress,
}

impl IndicatifReporter {
    #[must_use]
    pub const fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn stage(&self, message: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(IndicatifProgress::stage_bar(&self.multi, message))
    }
}

/// Installs the global logger and returns the [`MultiProgress`] every
/// progress bar must be added to.
///
/// Verbosity comes from `RUST_LOG`.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // A logger may already be installed when called from tests.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    #[test]
    fn stage_bar_switches_to_counted_bar() {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let progress = IndicatifProgress::stage_bar(&multi, "Resolving groups");

        progress.set_total(4);
        progress.inc(3);

        assert_eq!(progress.bar.length(), Some(4));
        assert_eq!(progress.bar.position(), 3);
        progress.finish("done".to_string());
        assert!(progress.bar.is_finished());
    }

    #[test]
    fn reporter_creates_independent_stages() {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let reporter = IndicatifReporter::new(multi);

        let first = reporter.stage("Searching locations");
        let second = reporter.stage("Resolving groups");
        first.set_total(2);
        first.finish_and_clear();
        second.set_total(5);
        second.inc(1);
    }
}
