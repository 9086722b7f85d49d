pub mod checkpoint;
pub mod import;
pub mod normalize;
pub mod retry;
pub mod stats;
pub mod store;

pub use checkpoint::{CheckpointError, CheckpointStore};
pub use import::{
    ImportError, ImportObserver, ImportOptions, ImportOrchestrator, ImportState, ImportSummary,
    ItemOutcome, PageRange, PageReport,
};
pub use normalize::{FieldIssue, FieldNormalizer, Normalized, NormalizedMovie};
pub use retry::RetryPolicy;
pub use stats::{ItemCounts, ItemTracker};
pub use store::{MemoryStore, MovieStore, PgMovieStore, StoreCounts, StoreError, StoredVersion, UpsertOutcome};
