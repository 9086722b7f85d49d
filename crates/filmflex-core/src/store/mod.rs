//! Catalog persistence.
//!
//! Both stores share the same conflict rule: a row is only overwritten when
//! the incoming record is newer than what is stored, or when either side has
//! no modification time to compare.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgMovieStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filmflex_models::{Episode, Movie};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("refusing to store '{slug}': {reason}")]
    Invalid { slug: String, reason: String },
}

impl StoreError {
    pub fn category(&self) -> &'static str {
        match self {
            StoreError::Database(_) => "store",
            StoreError::Invalid { .. } => "invalid_record",
        }
    }
}

/// What an upsert did to the movie row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Stored row is at least as new; nothing written
    Unchanged,
}

impl UpsertOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted)
    }
}

/// Modification time currently stored for a slug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredVersion {
    pub modified_at: Option<DateTime<Utc>>,
}

impl StoredVersion {
    /// True when `incoming` carries nothing newer than the stored row
    pub fn is_current(&self, incoming: Option<DateTime<Utc>>) -> bool {
        match (self.modified_at, incoming) {
            (Some(stored), Some(incoming)) => stored >= incoming,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub movies: u64,
    pub episodes: u64,
}

/// Whether an incoming record may replace the stored one
pub fn should_overwrite(stored: Option<DateTime<Utc>>, incoming: Option<DateTime<Utc>>) -> bool {
    match (stored, incoming) {
        (Some(stored), Some(incoming)) => stored < incoming,
        _ => true,
    }
}

pub(crate) fn validate(movie: &Movie, episodes: &[Episode]) -> Result<(), StoreError> {
    if movie.slug.trim().is_empty() {
        return Err(StoreError::Invalid { slug: movie.slug.clone(), reason: "empty slug".to_string() });
    }
    if movie.name.trim().is_empty() {
        return Err(StoreError::Invalid { slug: movie.slug.clone(), reason: "empty name".to_string() });
    }
    if let Some(stray) = episodes.iter().find(|e| e.movie_slug != movie.slug) {
        return Err(StoreError::Invalid {
            slug: movie.slug.clone(),
            reason: format!("episode '{}' belongs to '{}'", stray.slug, stray.movie_slug),
        });
    }
    Ok(())
}

/// Keyed, idempotent storage for movies and their episodes
#[async_trait]
pub trait MovieStore: Send + Sync {
    fn store_name(&self) -> &str;

    /// Insert or update one movie and its episodes atomically.
    /// Episodes are only written when the movie row is.
    async fn upsert_movie(&self, movie: &Movie, episodes: &[Episode]) -> Result<UpsertOutcome, StoreError>;

    /// None when the slug has never been stored
    async fn stored_version(&self, slug: &str) -> Result<Option<StoredVersion>, StoreError>;

    async fn counts(&self) -> Result<StoreCounts, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_overwrite_rule() {
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        assert!(should_overwrite(Some(older), Some(newer)));
        assert!(!should_overwrite(Some(newer), Some(older)));
        assert!(!should_overwrite(Some(newer), Some(newer)));
        assert!(should_overwrite(None, Some(newer)));
        assert!(should_overwrite(Some(newer), None));

        let version = StoredVersion { modified_at: Some(newer) };
        assert!(version.is_current(Some(older)));
        assert!(!version.is_current(None));
    }
}
