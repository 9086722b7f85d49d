//! Page-by-page import driver.
//!
//! For each page: fetch the stub list, then for every stub fetch the detail,
//! normalize it and upsert it. Item failures are counted, never fatal. The
//! checkpoint advances once every item of a page has been attempted.

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::normalize::FieldNormalizer;
use crate::retry::RetryPolicy;
use crate::stats::{format_error_breakdown, ItemCounts, ItemTracker};
use crate::store::MovieStore;
use filmflex_config::Config;
use filmflex_models::{ImportProgress, MovieStub};
use filmflex_sources::{CatalogSource, SortMode, SourceError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

#[cfg(test)]
mod tests;

/// Open-ended runs give up after this many page fetch failures in a row
const MAX_CONSECUTIVE_PAGE_FAILURES: u32 = 3;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid page range: {0}")]
    InvalidRange(String),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Inclusive page range; `end = None` runs until the catalog runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: u32,
    end: Option<u32>,
}

impl PageRange {
    pub fn new(start: u32, end: Option<u32>) -> Result<Self, ImportError> {
        if start == 0 {
            return Err(ImportError::InvalidRange("pages start at 1".to_string()));
        }
        if let Some(end) = end {
            if end < start {
                return Err(ImportError::InvalidRange(format!(
                    "end page {} is before start page {}",
                    end, start
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn single(page: u32) -> Result<Self, ImportError> {
        Self::new(page, Some(page))
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> Option<u32> {
        self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) if end == self.start => write!(f, "page {}", self.start),
            Some(end) => write!(f, "pages {}..={}", self.start, end),
            None => write!(f, "pages {}..", self.start),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    FetchingPage(u32),
    ProcessingItems(u32),
    PageComplete(u32),
    PageFailed(u32),
    Done,
}

/// Result of one stub's fetch → normalize → upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Saved,
    Existing,
    /// Stored row already current; detail fetch skipped
    Skipped,
    Failed { category: &'static str, reason: String },
}

/// Hooks for progress display. All methods default to no-ops.
pub trait ImportObserver: Send + Sync {
    fn page_started(&self, _page: u32, _items: usize) {}
    fn item_finished(&self, _page: u32, _slug: &str, _outcome: &ItemOutcome) {}
    fn page_finished(&self, _report: &PageReport) {}
    fn page_failed(&self, _page: u32, _error: &SourceError) {}
}

struct NoopObserver;

impl ImportObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub sort: SortMode,
    pub retry: RetryPolicy,
    pub skip_unchanged: bool,
    pub progress_interval: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            sort: SortMode::default(),
            retry: RetryPolicy::default(),
            skip_unchanged: false,
            progress_interval: 5,
        }
    }
}

impl ImportOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            // Config::validate rejects unknown sort modes
            sort: config.api.sort.parse().unwrap_or_default(),
            retry: RetryPolicy::from_config(&config.import),
            skip_unchanged: config.import.skip_unchanged,
            progress_interval: config.import.progress_interval.max(1),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub page: u32,
    pub items: usize,
    #[serde(flatten)]
    pub counts: ItemCounts,
    pub errors: BTreeMap<String, usize>,
    /// Total page count declared by the list endpoint
    pub total_pages: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub pages_completed: Vec<u32>,
    pub pages_failed: Vec<u32>,
    #[serde(flatten)]
    pub counts: ItemCounts,
    pub errors: BTreeMap<String, usize>,
    pub duration_secs: f64,
}

impl ImportSummary {
    fn absorb(&mut self, report: &PageReport) {
        self.pages_completed.push(report.page);
        self.counts.add(&report.counts);
        for (category, count) in &report.errors {
            *self.errors.entry(category.clone()).or_insert(0) += count;
        }
    }

    pub fn is_clean(&self) -> bool {
        self.pages_failed.is_empty() && self.counts.failed == 0
    }
}

enum PageOutcome {
    Completed(PageReport),
    /// Empty page past the end of an open-ended run; not checkpointed
    EndOfCatalog,
    Failed,
}

/// Drives imports against one source, one store and one checkpoint file
pub struct ImportOrchestrator {
    source: Arc<dyn CatalogSource>,
    store: Arc<dyn MovieStore>,
    checkpoint: CheckpointStore,
    normalizer: FieldNormalizer,
    options: ImportOptions,
    observer: Box<dyn ImportObserver>,
    state: ImportState,
}

impl ImportOrchestrator {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        store: Arc<dyn MovieStore>,
        checkpoint: CheckpointStore,
        normalizer: FieldNormalizer,
    ) -> Self {
        Self {
            source,
            store,
            checkpoint,
            normalizer,
            options: ImportOptions::default(),
            observer: Box::new(NoopObserver),
            state: ImportState::Idle,
        }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn ImportObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    fn transition(&mut self, next: ImportState) {
        trace!("Import state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// First page a resume should fetch
    pub fn resume_start_page(progress: Option<&ImportProgress>) -> u32 {
        progress.map(ImportProgress::next_page).unwrap_or(1)
    }

    pub async fn import_page(&mut self, page: u32) -> Result<ImportSummary, ImportError> {
        let range = PageRange::single(page)?;
        self.import_range(range).await
    }

    #[instrument(skip(self, range), fields(range = %range, source = self.source.source_name(), store = self.store.store_name()))]
    pub async fn import_range(&mut self, range: PageRange) -> Result<ImportSummary, ImportError> {
        let started = Instant::now();
        let mut summary = ImportSummary::default();
        let mut declared_total: Option<u32> = None;
        let mut consecutive_failures = 0u32;
        let mut page = range.start();

        info!("Importing {}", range);

        loop {
            if range.end().is_some_and(|end| page > end) {
                break;
            }
            if let Some(total) = declared_total.filter(|total| page > *total) {
                info!("Reached the last declared page ({})", total);
                break;
            }

            match self.run_page(page, range.end().is_none()).await? {
                PageOutcome::Completed(report) => {
                    consecutive_failures = 0;
                    declared_total = report.total_pages.or(declared_total);
                    summary.absorb(&report);
                }
                PageOutcome::EndOfCatalog => {
                    info!("Page {} is empty; stopping", page);
                    break;
                }
                PageOutcome::Failed => {
                    summary.pages_failed.push(page);
                    consecutive_failures += 1;
                    if range.end().is_none() && consecutive_failures >= MAX_CONSECUTIVE_PAGE_FAILURES {
                        warn!(
                            "{} consecutive page fetches failed; stopping at page {}",
                            consecutive_failures, page
                        );
                        break;
                    }
                }
            }

            match page.checked_add(1) {
                Some(next) => page = next,
                None => break,
            }
        }

        self.transition(ImportState::Done);
        summary.duration_secs = started.elapsed().as_secs_f64();
        log_summary(&format!("Import of {}", range), &summary);
        Ok(summary)
    }

    /// Continue after the checkpoint, for at most `max_pages` pages
    #[instrument(skip(self))]
    pub async fn resume(&mut self, max_pages: Option<u32>) -> Result<ImportSummary, ImportError> {
        let progress = self.checkpoint.read_progress()?;
        let start = Self::resume_start_page(progress.as_ref());
        let end = match max_pages {
            Some(0) => return Err(ImportError::InvalidRange("max pages must be at least 1".to_string())),
            Some(n) => Some(start.saturating_add(n - 1)),
            None => None,
        };

        match &progress {
            Some(p) => info!(
                "Resuming after page {} (checkpoint from {})",
                p.last_completed_page,
                p.timestamp.to_rfc3339()
            ),
            None => info!("No checkpoint found; starting from page 1"),
        }

        self.import_range(PageRange::new(start, end)?).await
    }

    /// Re-run pages whose list fetch failed earlier
    #[instrument(skip(self))]
    pub async fn retry_failed(&mut self) -> Result<ImportSummary, ImportError> {
        let started = Instant::now();
        let mut summary = ImportSummary::default();

        let failed_pages = self
            .checkpoint
            .read_progress()?
            .map(|p| p.failed_pages)
            .unwrap_or_default();
        if failed_pages.is_empty() {
            info!("No failed pages to retry");
            self.transition(ImportState::Done);
            return Ok(summary);
        }

        info!("Retrying {} failed pages: {:?}", failed_pages.len(), failed_pages);
        for page in failed_pages {
            match self.run_page(page, false).await? {
                PageOutcome::Completed(report) => summary.absorb(&report),
                PageOutcome::EndOfCatalog => {}
                PageOutcome::Failed => summary.pages_failed.push(page),
            }
        }

        self.transition(ImportState::Done);
        summary.duration_secs = started.elapsed().as_secs_f64();
        log_summary("Retry of failed pages", &summary);
        Ok(summary)
    }

    /// Fetch and import one page. With `stop_on_empty`, an empty page ends
    /// the run and leaves the checkpoint where it was.
    async fn run_page(&mut self, page: u32, stop_on_empty: bool) -> Result<PageOutcome, ImportError> {
        self.transition(ImportState::FetchingPage(page));

        let fetched = self
            .options
            .retry
            .run(&format!("Fetching page {}", page), || self.source.fetch_page(page, &self.options.sort))
            .await;

        let catalog_page = match fetched {
            Ok(catalog_page) => catalog_page,
            Err(e) => {
                warn!("Page {} failed: {}", page, e);
                self.transition(ImportState::PageFailed(page));
                self.checkpoint.record_page_failed(page)?;
                self.observer.page_failed(page, &e);
                return Ok(PageOutcome::Failed);
            }
        };

        if stop_on_empty && catalog_page.is_empty() {
            return Ok(PageOutcome::EndOfCatalog);
        }

        self.transition(ImportState::ProcessingItems(page));
        self.observer.page_started(page, catalog_page.stubs.len());

        let mut tracker = ItemTracker::new(page, catalog_page.stubs.len(), self.options.progress_interval);
        for (idx, stub) in catalog_page.stubs.iter().enumerate() {
            let outcome = self.process_item(stub, catalog_page.image_base.as_deref()).await;
            match &outcome {
                ItemOutcome::Saved => tracker.record_saved(),
                ItemOutcome::Existing | ItemOutcome::Skipped => tracker.record_existing(),
                ItemOutcome::Failed { category, .. } => tracker.record_failed_with_error(category),
            }
            self.observer.item_finished(page, &stub.slug, &outcome);
            tracker.log_progress(idx + 1);
        }

        self.checkpoint.record_page_complete(page)?;
        self.transition(ImportState::PageComplete(page));
        tracker.log_summary();

        let (counts, errors) = tracker.finish();
        let report = PageReport {
            page,
            items: catalog_page.stubs.len(),
            counts,
            errors,
            total_pages: catalog_page.total_pages(),
        };
        self.observer.page_finished(&report);
        Ok(PageOutcome::Completed(report))
    }

    async fn process_item(&self, stub: &MovieStub, image_base: Option<&str>) -> ItemOutcome {
        if self.options.skip_unchanged && stub.modified_at.is_some() {
            match self.store.stored_version(&stub.slug).await {
                Ok(Some(version)) if version.is_current(stub.modified_at) => {
                    debug!("{} unchanged since last import; skipping", stub.slug);
                    return ItemOutcome::Skipped;
                }
                Ok(_) => {}
                Err(e) => warn!("Could not check stored version of {}: {}", stub.slug, e),
            }
        }

        let detail = match self
            .options
            .retry
            .run(&format!("Fetching {}", stub.slug), || self.source.fetch_detail(&stub.slug))
            .await
        {
            Ok(detail) => detail,
            Err(e) => {
                warn!("Skipping {}: {}", stub.slug, e);
                return ItemOutcome::Failed { category: e.category(), reason: e.to_string() };
            }
        };

        let normalized = self.normalizer.normalize_movie(&detail, Some(stub), image_base);
        if !normalized.is_clean() {
            debug!("{}: {} fields degraded", stub.slug, normalized.issues.len());
            for issue in &normalized.issues {
                debug!("{}: degraded {} ({})", stub.slug, issue.field, issue.reason);
            }
        }

        match self.store.upsert_movie(&normalized.movie, &normalized.episodes).await {
            Ok(outcome) if outcome.is_new() => ItemOutcome::Saved,
            Ok(_) => ItemOutcome::Existing,
            Err(e) => {
                warn!("Failed to store {}: {}", stub.slug, e);
                ItemOutcome::Failed { category: e.category(), reason: e.to_string() }
            }
        }
    }
}

fn log_summary(operation: &str, summary: &ImportSummary) {
    if summary.is_clean() {
        info!(
            "{} completed in {:.1}s: {} pages | Saved: {} | Existing: {} | Failed: {}",
            operation,
            summary.duration_secs,
            summary.pages_completed.len(),
            summary.counts.saved,
            summary.counts.existing,
            summary.counts.failed
        );
        return;
    }

    warn!(
        "{} completed in {:.1}s: {} pages ({} failed: {:?}) | Saved: {} | Existing: {} | Failed: {}",
        operation,
        summary.duration_secs,
        summary.pages_completed.len(),
        summary.pages_failed.len(),
        summary.pages_failed,
        summary.counts.saved,
        summary.counts.existing,
        summary.counts.failed
    );
    if !summary.errors.is_empty() {
        info!("Error breakdown: {}", format_error_breakdown(&summary.errors));
    }
}
