use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use ciaserve_core::ProgressObserver;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Draws one terminal bar per running download and forwards every update
/// to the wrapped observer. Bars are keyed by file id, so a second download
/// of the same file takes over its bar.
pub struct TerminalProgress<O> {
    inner: O,
    bars: MultiProgress,
    active: Mutex<HashMap<String, ProgressBar>>,
}

impl<O> TerminalProgress<O> {
    pub fn new(inner: O) -> Self {
        Self::with_bars(inner, MultiProgress::new())
    }

    pub fn with_bars(inner: O, bars: MultiProgress) -> Self {
        Self {
            inner,
            bars,
            active: Mutex::new(HashMap::new()),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .map(|s| s.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }

    fn bar(&self, id: &str) -> Option<ProgressBar> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

impl<O: ProgressObserver> ProgressObserver for TerminalProgress<O> {
    fn begin(&self, id: &str, total: u64) {
        self.inner.begin(id, total);

        let pb = self.bars.add(ProgressBar::new(total));
        pb.set_style(Self::style());
        pb.set_message(id.to_string());
        let replaced = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), pb);
        if let Some(old) = replaced {
            old.abandon_with_message(format!("{id} (restarted)"));
        }
    }

    fn record(&self, id: &str, fraction: f64) {
        self.inner.record(id, fraction);
        if let Some(pb) = self.bar(id) {
            let total = pb.length().unwrap_or(0);
            pb.set_position((fraction.clamp(0.0, 1.0) * total as f64).round() as u64);
        }
    }

    fn end(&self, id: &str, completed: bool) {
        self.inner.end(id, completed);
        let finished = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if let Some(pb) = finished {
            if completed {
                pb.finish_with_message(format!("{id} done"));
            } else {
                pb.abandon_with_message(format!("{id} stopped"));
            }
        }
    }
}
