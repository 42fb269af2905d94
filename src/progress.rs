//! Live progress for a running crawl job.
//!
//! Workers update lock-free counters; the CLI polls a point-in-time
//! snapshot. Nothing here is persisted - the final tallies land on the
//! job row when the crawl reaches a terminal state.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Lock-free counter for hot-path updates.
#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self { value: AtomicU64::new(0) }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared between the runner's workers and whoever is watching the job.
pub struct JobProgress {
    started: Instant,
    pub pages_crawled: Counter,
    pub pages_discovered: Counter,
    pub pages_failed: Counter,
    pub issues_found: Counter,
    current_url: Mutex<Option<String>>,
}

impl JobProgress {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            pages_crawled: Counter::new(),
            pages_discovered: Counter::new(),
            pages_failed: Counter::new(),
            issues_found: Counter::new(),
            current_url: Mutex::new(None),
        }
    }

    pub fn set_current_url(&self, url: &str) {
        *self.current_url.lock() = Some(url.to_string());
    }

    pub fn clear_current_url(&self) {
        *self.current_url.lock() = None;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            pages_crawled: self.pages_crawled.get(),
            pages_discovered: self.pages_discovered.get(),
            pages_failed: self.pages_failed.get(),
            issues_found: self.issues_found.get(),
            current_url: self.current_url.lock().clone(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

impl Default for JobProgress {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedProgress = Arc<JobProgress>;

/// Point-in-time view of a job, safe to serialize for the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub pages_crawled: u64,
    pub pages_discovered: u64,
    pub pages_failed: u64,
    pub issues_found: u64,
    pub current_url: Option<String>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.add(5);
        assert_eq!(counter.get(), 6);
    }

    #[test]
    fn test_snapshot_reflects_updates() {
        let progress = JobProgress::new();
        progress.pages_crawled.inc();
        progress.pages_crawled.inc();
        progress.pages_discovered.add(7);
        progress.pages_failed.inc();
        progress.set_current_url("https://example.com/services");

        let snap = progress.snapshot();
        assert_eq!(snap.pages_crawled, 2);
        assert_eq!(snap.pages_discovered, 7);
        assert_eq!(snap.pages_failed, 1);
        assert_eq!(
            snap.current_url.as_deref(),
            Some("https://example.com/services")
        );

        progress.clear_current_url();
        assert!(progress.snapshot().current_url.is_none());
    }

    #[test]
    fn test_shared_across_tasks() {
        let progress: SharedProgress = Arc::new(JobProgress::new());
        let cloned = Arc::clone(&progress);
        cloned.pages_crawled.inc();
        assert_eq!(progress.snapshot().pages_crawled, 1);
    }
}
