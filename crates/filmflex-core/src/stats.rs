use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

/// Per-item tallies. `existing` covers updates, unchanged rows and
/// skip-unchanged hits; `saved` is only brand-new rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemCounts {
    pub saved: usize,
    pub existing: usize,
    pub failed: usize,
}

impl ItemCounts {
    pub fn total(&self) -> usize {
        self.saved + self.existing + self.failed
    }

    pub fn add(&mut self, other: &ItemCounts) {
        self.saved += other.saved;
        self.existing += other.existing;
        self.failed += other.failed;
    }
}

/// Format an error breakdown, most frequent first
pub fn format_error_breakdown(errors: &BTreeMap<String, usize>) -> String {
    let mut entries: Vec<_> = errors.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1));
    entries
        .iter()
        .map(|(category, count)| format!("{}: {}", category, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Counts items on one page and keeps progress logging quiet
pub struct ItemTracker {
    page: u32,
    total: usize,
    counts: ItemCounts,
    start_time: Instant,
    progress_interval: usize,
    last_progress_log: usize,
    error_counts: BTreeMap<String, usize>,
}

impl ItemTracker {
    pub fn new(page: u32, total: usize, progress_interval: usize) -> Self {
        if total > 0 {
            info!("Page {}: {} movies to import", page, total);
        }
        Self {
            page,
            total,
            counts: ItemCounts::default(),
            start_time: Instant::now(),
            progress_interval: progress_interval.max(1),
            last_progress_log: 0,
            error_counts: BTreeMap::new(),
        }
    }

    pub fn record_saved(&mut self) {
        self.counts.saved += 1;
    }

    pub fn record_existing(&mut self) {
        self.counts.existing += 1;
    }

    pub fn record_failed_with_error(&mut self, error_category: &str) {
        self.counts.failed += 1;
        *self.error_counts.entry(error_category.to_string()).or_insert(0) += 1;
    }

    /// Call after each item with its 1-based position
    pub fn log_progress(&mut self, current: usize) {
        if current.saturating_sub(self.last_progress_log) >= self.progress_interval || current == self.total {
            info!(
                "Page {} progress: {}/{} | Saved: {} | Existing: {} | Failed: {}",
                self.page, current, self.total, self.counts.saved, self.counts.existing, self.counts.failed
            );
            self.last_progress_log = current;
        }
    }

    pub fn log_summary(&self) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if self.counts.failed > 0 {
            warn!(
                "Page {} completed: {} movies in {:.1}s | Saved: {} | Existing: {} | Failed: {}",
                self.page, self.total, elapsed, self.counts.saved, self.counts.existing, self.counts.failed
            );
            if !self.error_counts.is_empty() {
                info!("Page {} error breakdown: {}", self.page, format_error_breakdown(&self.error_counts));
            }
        } else {
            info!(
                "Page {} completed: {} movies in {:.1}s | Saved: {} | Existing: {}",
                self.page, self.total, elapsed, self.counts.saved, self.counts.existing
            );
        }
    }

    pub fn finish(self) -> (ItemCounts, BTreeMap<String, usize>) {
        (self.counts, self.error_counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_and_breakdown() {
        let mut tracker = ItemTracker::new(1, 4, 2);
        tracker.record_saved();
        tracker.record_existing();
        tracker.record_failed_with_error("http_status");
        tracker.record_failed_with_error("http_status");
        tracker.log_progress(4);
        tracker.log_summary();

        let (counts, errors) = tracker.finish();
        assert_eq!(counts, ItemCounts { saved: 1, existing: 1, failed: 2 });
        assert_eq!(counts.total(), 4);
        assert_eq!(errors.get("http_status"), Some(&2));
    }

    #[test]
    fn test_breakdown_orders_by_count() {
        let errors = BTreeMap::from([("decode".to_string(), 1), ("transport".to_string(), 3)]);
        assert_eq!(format_error_breakdown(&errors), "transport: 3, decode: 1");
    }
}
