// src/progress.rs
//! Download progress bar using indicatif

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for fetching log entries into the cache file
pub struct DownloadProgress {
    bar: Option<ProgressBar>,
}

impl DownloadProgress {
    /// Create a bar covering entries `start..target`
    pub fn new(enabled: bool, start: u64, target: u64) -> Self {
        if !enabled || start >= target {
            return Self::hidden();
        }

        let bar = ProgressBar::new(target);
        bar.set_position(start);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} entries ({per_sec}, eta {eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }

        Self { bar: Some(bar) }
    }

    /// Progress reporting that draws nothing
    pub fn hidden() -> Self {
        Self { bar: None }
    }

    /// Record `n` more entries written to the cache
    pub fn advance(&self, n: u64) {
        if let Some(ref bar) = self.bar {
            bar.inc(n);
        }
    }

    /// Finish and clear the bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bar.is_some()
    }

    pub fn position(&self) -> Option<u64> {
        self.bar.as_ref().map(|b| b.position())
    }
}

impl Drop for DownloadProgress {
    fn drop(&mut self) {
        self.finish();
    }
}
