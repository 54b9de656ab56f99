//! Progress indicators for the command line
//!
//! Thin wrapper over `indicatif` with Commodore's styling. Progress output is
//! suppressed entirely when `COMMODORE_NO_PROGRESS` is set, which keeps CI
//! logs readable.
//!
//! # Examples
//!
//! ```rust
//! use commodore::utils::progress::ProgressBar;
//!
//! let progress = ProgressBar::new(3);
//! progress.set_prefix("Syncing");
//! for name in ["argocd", "metrics-server", "nfs-provisioner"] {
//!     progress.set_message(name);
//!     progress.inc(1);
//! }
//! progress.finish_and_clear();
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};

/// Environment variable that disables all progress output.
pub const NO_PROGRESS_ENV: &str = "COMMODORE_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

/// A progress bar with Commodore's styling.
///
/// Cloning is cheap and all clones drive the same bar, so it can be handed
/// to concurrently running tasks.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates a bar tracking `len` units of work, or a hidden one when
    /// progress output is disabled.
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

    /// Creates a bar that never draws.
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Sets the message shown after the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Sets the prefix shown before the bar.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.inner.set_prefix(prefix.into());
    }

    /// Advances the bar.
    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    /// Current position.
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Removes the bar from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn default_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map_or_else(|_| IndicatifStyle::default_bar(), |style| style.progress_chars("━╸━"))
}
