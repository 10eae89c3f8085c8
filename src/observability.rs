//! Per-run counters and tracing setup

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Counters for one logbook run; never shared between runs
#[derive(Debug, Default)]
pub struct RunStats {
    ascents_received: AtomicU64,
    entries_emitted: AtomicU64,
    grades_skipped: AtomicU64,
    malformed_skipped: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ascent_received(&self) {
        self.ascents_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entry_emitted(&self) {
        self.entries_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn grade_skipped(&self) {
        self.grades_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "grades_skipped", "Metric incremented");
    }

    pub fn malformed_skipped(&self) {
        self.malformed_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "malformed_skipped", "Metric incremented");
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            ascents_received: self.ascents_received.load(Ordering::Relaxed),
            entries_emitted: self.entries_emitted.load(Ordering::Relaxed),
            grades_skipped: self.grades_skipped.load(Ordering::Relaxed),
            malformed_skipped: self.malformed_skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSnapshot {
    pub ascents_received: u64,
    pub entries_emitted: u64,
    pub grades_skipped: u64,
    pub malformed_skipped: u64,
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr so stdout stays free for the record stream. The filter
/// comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
