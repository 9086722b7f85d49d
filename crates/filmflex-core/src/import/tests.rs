use super::*;
use crate::store::{MemoryStore, StoreCounts};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use filmflex_models::{CatalogPage, MovieDetail, Pagination};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tempfile::TempDir;

#[derive(Clone, Copy)]
enum DetailBehaviour {
    Fail,
    Malformed,
    FailOnce,
}

#[derive(Default)]
struct FakeCatalog {
    pages: HashMap<u32, Vec<MovieStub>>,
    failing_pages: HashSet<u32>,
    total_pages: Option<u32>,
    details: HashMap<String, DetailBehaviour>,
    page_calls: Mutex<Vec<u32>>,
    detail_calls: Mutex<Vec<String>>,
}

fn stub(slug: &str) -> MovieStub {
    MovieStub {
        slug: slug.to_string(),
        name: format!("Movie {}", slug),
        origin_name: None,
        kind: Some("single".to_string()),
        thumb_url: Some(format!("{}-thumb.jpg", slug)),
        poster_url: None,
        year: Some(2023),
        modified_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
    }
}

impl FakeCatalog {
    fn with_page(mut self, page: u32, count: usize) -> Self {
        let stubs = (1..=count).map(|i| stub(&format!("p{}-m{}", page, i))).collect();
        self.pages.insert(page, stubs);
        self
    }

    fn with_failing_page(mut self, page: u32) -> Self {
        self.failing_pages.insert(page);
        self
    }

    fn with_detail(mut self, slug: &str, behaviour: DetailBehaviour) -> Self {
        self.details.insert(slug.to_string(), behaviour);
        self
    }

    fn with_total_pages(mut self, total: u32) -> Self {
        self.total_pages = Some(total);
        self
    }

    fn page_calls(&self) -> Vec<u32> {
        self.page_calls.lock().unwrap().clone()
    }

    fn detail_calls(&self, slug: &str) -> usize {
        self.detail_calls.lock().unwrap().iter().filter(|s| *s == slug).count()
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    fn source_name(&self) -> &str {
        "fake"
    }

    async fn fetch_page(&self, page: u32, _sort: &SortMode) -> Result<CatalogPage, SourceError> {
        self.page_calls.lock().unwrap().push(page);
        if self.failing_pages.contains(&page) {
            return Err(SourceError::Status {
                url: format!("fake/list?page={}", page),
                status: 500,
                body: "upstream down".to_string(),
            });
        }
        Ok(CatalogPage {
            page,
            stubs: self.pages.get(&page).cloned().unwrap_or_default(),
            pagination: self.total_pages.map(|total| Pagination {
                current_page: page,
                total_pages: total,
                total_items: 0,
                items_per_page: 10,
            }),
            image_base: Some("https://img.example/uploads".to_string()),
        })
    }

    async fn fetch_detail(&self, slug: &str) -> Result<MovieDetail, SourceError> {
        let previous_calls = self.detail_calls(slug);
        self.detail_calls.lock().unwrap().push(slug.to_string());

        match self.details.get(slug).copied() {
            Some(DetailBehaviour::Fail) => Err(SourceError::Status {
                url: format!("fake/phim/{}", slug),
                status: 404,
                body: String::new(),
            }),
            Some(DetailBehaviour::Malformed) => Err(SourceError::malformed(slug, "missing movie object")),
            Some(DetailBehaviour::FailOnce) if previous_calls == 0 => Err(SourceError::Transport {
                url: format!("fake/phim/{}", slug),
                message: "connection reset".to_string(),
            }),
            _ => Ok(MovieDetail {
                slug: slug.to_string(),
                name: Some(format!("Movie {}", slug)),
                year: json!(2023),
                categories: json!(["Hành Động"]),
                modified_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
                ..Default::default()
            }),
        }
    }
}

struct Harness {
    _dir: TempDir,
    catalog: Arc<FakeCatalog>,
    store: Arc<MemoryStore>,
    orchestrator: ImportOrchestrator,
}

fn harness(catalog: FakeCatalog) -> Harness {
    harness_with(catalog, ImportOptions { retry: RetryPolicy::none(), ..ImportOptions::default() })
}

fn harness_with(catalog: FakeCatalog, options: ImportOptions) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(catalog);
    let store = Arc::new(MemoryStore::new());
    let orchestrator = ImportOrchestrator::new(
        catalog.clone(),
        store.clone(),
        CheckpointStore::new(dir.path().join("progress.json")),
        FieldNormalizer::new(2024),
    )
    .with_options(options);

    Harness { _dir: dir, catalog, store, orchestrator }
}

fn checkpoint_page(h: &Harness) -> Option<u32> {
    h.orchestrator
        .checkpoint()
        .read_progress()
        .unwrap()
        .map(|p| p.last_completed_page)
}

#[tokio::test]
async fn test_one_failed_detail_does_not_stop_the_page() {
    let mut h = harness(FakeCatalog::default().with_page(1, 20).with_detail("p1-m7", DetailBehaviour::Fail));

    let summary = h.orchestrator.import_range(PageRange::new(1, Some(1)).unwrap()).await.unwrap();

    assert_eq!(summary.counts.saved, 19);
    assert_eq!(summary.counts.failed, 1);
    assert_eq!(summary.counts.existing, 0);
    assert_eq!(summary.pages_completed, vec![1]);
    assert_eq!(summary.errors.get("http_status"), Some(&1));
    assert_eq!(checkpoint_page(&h), Some(1));
    assert_eq!(h.store.counts().await.unwrap().movies, 19);
    assert_eq!(h.orchestrator.state(), ImportState::Done);
}

#[tokio::test]
async fn test_malformed_item_is_counted_and_progress_advances() {
    let mut h = harness(FakeCatalog::default().with_page(1, 10).with_detail("p1-m4", DetailBehaviour::Malformed));

    let summary = h.orchestrator.import_page(1).await.unwrap();

    assert_eq!(summary.counts, ItemCounts { saved: 9, existing: 0, failed: 1 });
    assert_eq!(summary.errors.get("malformed"), Some(&1));
    assert_eq!(checkpoint_page(&h), Some(1));
    assert!(h.store.movie("p1-m4").await.is_none());

    let saved = h.store.movie("p1-m1").await.unwrap();
    assert_eq!(saved.categories, vec!["Hành Động"]);
    assert_eq!(saved.thumb_url.as_deref(), Some("https://img.example/uploads/p1-m1-thumb.jpg"));
}

#[tokio::test]
async fn test_failed_page_fetch_leaves_checkpoint_and_records_page() {
    let mut h = harness(FakeCatalog::default().with_failing_page(1));

    let summary = h.orchestrator.import_page(1).await.unwrap();

    assert!(summary.pages_completed.is_empty());
    assert_eq!(summary.pages_failed, vec![1]);
    let progress = h.orchestrator.checkpoint().read_progress().unwrap().unwrap();
    assert_eq!(progress.last_completed_page, 0);
    assert_eq!(progress.failed_pages, vec![1]);
}

#[tokio::test]
async fn test_range_moves_past_failed_page() {
    let mut h = harness(
        FakeCatalog::default()
            .with_page(1, 2)
            .with_failing_page(2)
            .with_page(3, 2),
    );

    let summary = h.orchestrator.import_range(PageRange::new(1, Some(3)).unwrap()).await.unwrap();

    assert_eq!(summary.pages_completed, vec![1, 3]);
    assert_eq!(summary.pages_failed, vec![2]);
    assert_eq!(summary.counts.saved, 4);
    let progress = h.orchestrator.checkpoint().read_progress().unwrap().unwrap();
    assert_eq!(progress.last_completed_page, 3);
    assert_eq!(progress.failed_pages, vec![2]);
}

#[tokio::test]
async fn test_retry_failed_clears_recovered_pages() {
    let mut h = harness(FakeCatalog::default().with_page(2, 3).with_page(5, 1));
    let checkpoint = h.orchestrator.checkpoint().clone();
    checkpoint.record_page_complete(6).unwrap();
    checkpoint.record_page_failed(2).unwrap();
    checkpoint.record_page_failed(5).unwrap();

    let summary = h.orchestrator.retry_failed().await.unwrap();

    assert_eq!(summary.pages_completed, vec![2, 5]);
    assert_eq!(summary.counts.saved, 4);
    let progress = checkpoint.read_progress().unwrap().unwrap();
    assert_eq!(progress.last_completed_page, 6);
    assert!(progress.failed_pages.is_empty());
}

#[tokio::test]
async fn test_retry_failed_without_failures_is_a_no_op() {
    let mut h = harness(FakeCatalog::default());
    let summary = h.orchestrator.retry_failed().await.unwrap();
    assert!(summary.pages_completed.is_empty());
    assert!(h.catalog.page_calls().is_empty());
}

#[test]
fn test_resume_start_page() {
    assert_eq!(ImportOrchestrator::resume_start_page(None), 1);
    let progress = ImportProgress::new(41);
    assert_eq!(ImportOrchestrator::resume_start_page(Some(&progress)), 42);
}

#[tokio::test]
async fn test_resume_continues_after_checkpoint() {
    let mut h = harness(FakeCatalog::default().with_page(4, 2).with_page(5, 2));
    h.orchestrator.checkpoint().record_page_complete(3).unwrap();

    let summary = h.orchestrator.resume(Some(2)).await.unwrap();

    assert_eq!(h.catalog.page_calls(), vec![4, 5]);
    assert_eq!(summary.pages_completed, vec![4, 5]);
    assert_eq!(checkpoint_page(&h), Some(5));
}

#[tokio::test]
async fn test_resume_without_checkpoint_starts_at_one() {
    let mut h = harness(FakeCatalog::default().with_page(1, 1));
    h.orchestrator.resume(Some(1)).await.unwrap();
    assert_eq!(h.catalog.page_calls(), vec![1]);
}

#[tokio::test]
async fn test_open_range_stops_at_declared_total() {
    let mut h = harness(
        FakeCatalog::default()
            .with_page(1, 1)
            .with_page(2, 1)
            .with_page(3, 1)
            .with_total_pages(2),
    );

    let summary = h.orchestrator.import_range(PageRange::new(1, None).unwrap()).await.unwrap();

    assert_eq!(h.catalog.page_calls(), vec![1, 2]);
    assert_eq!(summary.counts.saved, 2);
}

#[tokio::test]
async fn test_open_range_stops_at_empty_page() {
    let mut h = harness(FakeCatalog::default().with_page(1, 2));

    let summary = h.orchestrator.import_range(PageRange::new(1, None).unwrap()).await.unwrap();

    assert_eq!(h.catalog.page_calls(), vec![1, 2]);
    assert_eq!(summary.pages_completed, vec![1]);
    assert_eq!(checkpoint_page(&h), Some(1));

    // The next resume asks for the same page again once the catalog grows
    assert_eq!(
        ImportOrchestrator::resume_start_page(h.orchestrator.checkpoint().read_progress().unwrap().as_ref()),
        2
    );
}

#[tokio::test]
async fn test_bounded_range_records_empty_page() {
    let mut h = harness(FakeCatalog::default().with_page(1, 2));

    let summary = h.orchestrator.import_range(PageRange::new(1, Some(2)).unwrap()).await.unwrap();

    assert_eq!(summary.pages_completed, vec![1, 2]);
    assert_eq!(checkpoint_page(&h), Some(2));
}

#[tokio::test]
async fn test_open_range_gives_up_after_repeated_page_failures() {
    let mut h = harness(
        FakeCatalog::default()
            .with_failing_page(1)
            .with_failing_page(2)
            .with_failing_page(3),
    );

    let summary = h.orchestrator.import_range(PageRange::new(1, None).unwrap()).await.unwrap();

    assert_eq!(summary.pages_failed, vec![1, 2, 3]);
    assert_eq!(h.catalog.page_calls(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_reimport_is_idempotent_and_checkpoint_never_regresses() {
    let mut h = harness(FakeCatalog::default().with_page(2, 3).with_page(5, 1));

    h.orchestrator.import_page(5).await.unwrap();
    let first = h.orchestrator.import_page(2).await.unwrap();
    let second = h.orchestrator.import_page(2).await.unwrap();

    assert_eq!(first.counts.saved, 3);
    assert_eq!(second.counts, ItemCounts { saved: 0, existing: 3, failed: 0 });
    assert_eq!(h.store.counts().await.unwrap(), StoreCounts { movies: 4, episodes: 0 });
    assert_eq!(checkpoint_page(&h), Some(5));
}

#[tokio::test]
async fn test_transient_detail_error_is_retried() {
    let options = ImportOptions {
        retry: RetryPolicy { max_attempts: 2, ..RetryPolicy::none() },
        ..ImportOptions::default()
    };
    let mut h = harness_with(
        FakeCatalog::default().with_page(1, 2).with_detail("p1-m2", DetailBehaviour::FailOnce),
        options,
    );

    let summary = h.orchestrator.import_page(1).await.unwrap();

    assert_eq!(summary.counts.saved, 2);
    assert_eq!(h.catalog.detail_calls("p1-m2"), 2);
}

#[tokio::test]
async fn test_permanent_detail_error_is_not_retried() {
    let options = ImportOptions {
        retry: RetryPolicy { max_attempts: 3, ..RetryPolicy::none() },
        ..ImportOptions::default()
    };
    let mut h = harness_with(
        FakeCatalog::default().with_page(1, 1).with_detail("p1-m1", DetailBehaviour::Fail),
        options,
    );

    h.orchestrator.import_page(1).await.unwrap();
    assert_eq!(h.catalog.detail_calls("p1-m1"), 1);
}

#[tokio::test]
async fn test_skip_unchanged_avoids_detail_fetch() {
    let options = ImportOptions {
        retry: RetryPolicy::none(),
        skip_unchanged: true,
        ..ImportOptions::default()
    };
    let mut h = harness_with(FakeCatalog::default().with_page(1, 2), options);

    h.orchestrator.import_page(1).await.unwrap();
    let second = h.orchestrator.import_page(1).await.unwrap();

    assert_eq!(second.counts.existing, 2);
    assert_eq!(h.catalog.detail_calls("p1-m1"), 1);
}

#[tokio::test]
async fn test_invalid_ranges_are_rejected() {
    assert!(matches!(PageRange::new(0, None), Err(ImportError::InvalidRange(_))));
    assert!(matches!(PageRange::new(5, Some(4)), Err(ImportError::InvalidRange(_))));

    let mut h = harness(FakeCatalog::default());
    assert!(matches!(h.orchestrator.import_page(0).await, Err(ImportError::InvalidRange(_))));
    assert!(matches!(h.orchestrator.resume(Some(0)).await, Err(ImportError::InvalidRange(_))));
    assert!(h.catalog.page_calls().is_empty());
}

#[derive(Default)]
struct RecordingObserver {
    events: Arc<Mutex<Vec<String>>>,
}

impl ImportObserver for RecordingObserver {
    fn page_started(&self, page: u32, items: usize) {
        self.events.lock().unwrap().push(format!("start {} {}", page, items));
    }

    fn item_finished(&self, _page: u32, slug: &str, outcome: &ItemOutcome) {
        let label = match outcome {
            ItemOutcome::Saved => "saved",
            ItemOutcome::Existing | ItemOutcome::Skipped => "existing",
            ItemOutcome::Failed { .. } => "failed",
        };
        self.events.lock().unwrap().push(format!("{} {}", slug, label));
    }

    fn page_failed(&self, page: u32, _error: &SourceError) {
        self.events.lock().unwrap().push(format!("failed page {}", page));
    }
}

#[tokio::test]
async fn test_observer_sees_page_and_item_events() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let h = harness(
        FakeCatalog::default()
            .with_page(1, 2)
            .with_detail("p1-m2", DetailBehaviour::Fail)
            .with_failing_page(2),
    );
    let mut orchestrator = h
        .orchestrator
        .with_observer(Box::new(RecordingObserver { events: events.clone() }));

    orchestrator.import_range(PageRange::new(1, Some(2)).unwrap()).await.unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec!["start 1 2", "p1-m1 saved", "p1-m2 failed", "failed page 2"]
    );
}
