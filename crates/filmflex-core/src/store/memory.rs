use super::{should_overwrite, validate, MovieStore, StoreCounts, StoreError, StoredVersion, UpsertOutcome};
use async_trait::async_trait;
use filmflex_models::{Episode, Movie};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    movies: BTreeMap<String, Movie>,
    episodes: BTreeMap<(String, String, String), Episode>,
}

/// In-process store used for dry runs and tests
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn movie(&self, slug: &str) -> Option<Movie> {
        self.tables.lock().await.movies.get(slug).cloned()
    }

    pub async fn episodes_for(&self, slug: &str) -> Vec<Episode> {
        self.tables
            .lock()
            .await
            .episodes
            .values()
            .filter(|e| e.movie_slug == slug)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MovieStore for MemoryStore {
    fn store_name(&self) -> &str {
        "memory"
    }

    async fn upsert_movie(&self, movie: &Movie, episodes: &[Episode]) -> Result<UpsertOutcome, StoreError> {
        validate(movie, episodes)?;
        let mut tables = self.tables.lock().await;

        let outcome = match tables.movies.get(&movie.slug) {
            None => UpsertOutcome::Inserted,
            Some(stored) if should_overwrite(stored.modified_at, movie.modified_at) => UpsertOutcome::Updated,
            Some(_) => return Ok(UpsertOutcome::Unchanged),
        };

        tables.movies.insert(movie.slug.clone(), movie.clone());
        for episode in episodes {
            tables.episodes.insert(episode.key(), episode.clone());
        }
        Ok(outcome)
    }

    async fn stored_version(&self, slug: &str) -> Result<Option<StoredVersion>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .movies
            .get(slug)
            .map(|m| StoredVersion { modified_at: m.modified_at }))
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let tables = self.tables.lock().await;
        Ok(StoreCounts {
            movies: tables.movies.len() as u64,
            episodes: tables.episodes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use filmflex_models::MovieKind;

    fn movie(slug: &str, name: &str, month: u32) -> Movie {
        Movie {
            slug: slug.to_string(),
            name: name.to_string(),
            origin_name: None,
            description: None,
            kind: MovieKind::Single,
            status: None,
            quality: None,
            language: None,
            year: 2024,
            view_count: 0,
            directors: vec![],
            actors: vec![],
            categories: vec![],
            countries: vec![],
            episode_current: None,
            episode_total: None,
            poster_url: None,
            thumb_url: None,
            trailer_url: None,
            modified_at: Some(Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap()),
        }
    }

    fn episode(movie_slug: &str, slug: &str) -> Episode {
        Episode {
            movie_slug: movie_slug.to_string(),
            server_name: "Vietsub #1".to_string(),
            name: slug.to_string(),
            slug: slug.to_string(),
            link_embed: None,
            link_m3u8: None,
            position: 0,
        }
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row() {
        let store = MemoryStore::new();
        let m = movie("nam", "Năm", 3);
        let eps = vec![episode("nam", "tap-1"), episode("nam", "tap-2")];

        assert_eq!(store.upsert_movie(&m, &eps).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert_movie(&m, &eps).await.unwrap(), UpsertOutcome::Unchanged);

        let counts = store.counts().await.unwrap();
        assert_eq!(counts, StoreCounts { movies: 1, episodes: 2 });
    }

    #[tokio::test]
    async fn test_newer_record_updates_older_does_not() {
        let store = MemoryStore::new();
        store.upsert_movie(&movie("nam", "Năm", 3), &[]).await.unwrap();

        let newer = movie("nam", "Năm (2)", 5);
        assert_eq!(store.upsert_movie(&newer, &[]).await.unwrap(), UpsertOutcome::Updated);

        let older = movie("nam", "Năm (old)", 1);
        assert_eq!(store.upsert_movie(&older, &[episode("nam", "tap-9")]).await.unwrap(), UpsertOutcome::Unchanged);

        assert_eq!(store.movie("nam").await.unwrap().name, "Năm (2)");
        assert!(store.episodes_for("nam").await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_modified_time_always_overwrites() {
        let store = MemoryStore::new();
        let mut m = movie("nam", "Năm", 3);
        m.modified_at = None;
        store.upsert_movie(&m, &[]).await.unwrap();
        assert_eq!(store.upsert_movie(&m, &[]).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.counts().await.unwrap().movies, 1);
    }

    #[tokio::test]
    async fn test_rejects_invalid_records() {
        let store = MemoryStore::new();
        let err = store.upsert_movie(&movie(" ", "x", 1), &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));

        let err = store
            .upsert_movie(&movie("nam", "Năm", 1), &[episode("other", "tap-1")])
            .await
            .unwrap_err();
        assert_eq!(err.category(), "invalid_record");
        assert_eq!(store.counts().await.unwrap(), StoreCounts::default());
    }
}
