//! Progress indicators for long-running CLI operations.
//!
//! Thin wrapper over `indicatif` with cloudcom styling. Progress output goes to
//! stderr (indicatif's default draw target), so it never mixes with transformed
//! source printed on stdout.
//!
//! # Environment Variables
//!
//! - `CLOUDCOM_NO_PROGRESS`: Set to any value to disable all progress indicators

use crate::constants::NO_PROGRESS_ENV;
use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

/// A progress bar with consistent styling.
///
/// Created hidden when progress is disabled by flag or environment, in which
/// case every operation is a no-op.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates a bar tracking `len` units of work.
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(default_style());
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Creates a spinner for work of unknown size.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Creates a bar that never draws.
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Sets the message shown next to the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Advances the bar.
    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    /// Finishes the bar leaving a final message.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Finishes the bar and removes it from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

/// Creates a bar for `len` items, or a hidden one when `enabled` is false.
pub fn create_progress_bar(len: u64, enabled: bool) -> ProgressBar {
    if enabled {
        ProgressBar::new(len)
    } else {
        ProgressBar::hidden()
    }
}

fn default_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("=>-")
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
}
