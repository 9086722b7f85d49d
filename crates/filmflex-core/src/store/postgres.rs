use super::{validate, MovieStore, StoreCounts, StoreError, StoredVersion, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filmflex_models::{Episode, Movie};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, info, instrument};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

// Seven binds per row keeps each statement far below the 65535 parameter cap
const EPISODE_CHUNK: usize = 500;

const UPSERT_MOVIE: &str = "
INSERT INTO movies (
    slug, name, origin_name, description, kind, status, quality, language,
    year, view_count, directors, actors, categories, countries,
    episode_current, episode_total, poster_url, thumb_url, trailer_url, modified_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
ON CONFLICT (slug) DO UPDATE SET
    name = EXCLUDED.name,
    origin_name = EXCLUDED.origin_name,
    description = EXCLUDED.description,
    kind = EXCLUDED.kind,
    status = EXCLUDED.status,
    quality = EXCLUDED.quality,
    language = EXCLUDED.language,
    year = EXCLUDED.year,
    view_count = EXCLUDED.view_count,
    directors = EXCLUDED.directors,
    actors = EXCLUDED.actors,
    categories = EXCLUDED.categories,
    countries = EXCLUDED.countries,
    episode_current = EXCLUDED.episode_current,
    episode_total = EXCLUDED.episode_total,
    poster_url = EXCLUDED.poster_url,
    thumb_url = EXCLUDED.thumb_url,
    trailer_url = EXCLUDED.trailer_url,
    modified_at = EXCLUDED.modified_at,
    updated_at = now()
WHERE movies.modified_at IS NULL
   OR EXCLUDED.modified_at IS NULL
   OR movies.modified_at < EXCLUDED.modified_at
RETURNING (xmax = 0) AS inserted";

/// Postgres-backed catalog
#[derive(Clone)]
pub struct PgMovieStore {
    pool: PgPool,
}

impl PgMovieStore {
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        debug!("Connected to Postgres (max {} connections)", max_connections);
        Ok(Self { pool })
    }

    /// Create tables and indexes if they don't exist
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        info!("Catalog schema ready");
        Ok(())
    }

    async fn upsert_episodes(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        episodes: &[Episode],
    ) -> Result<(), StoreError> {
        for chunk in episodes.chunks(EPISODE_CHUNK) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO episodes (movie_slug, server_name, name, slug, link_embed, link_m3u8, position) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(&e.movie_slug)
                    .push_bind(&e.server_name)
                    .push_bind(&e.name)
                    .push_bind(&e.slug)
                    .push_bind(&e.link_embed)
                    .push_bind(&e.link_m3u8)
                    .push_bind(e.position);
            });
            qb.push(
                " ON CONFLICT (movie_slug, server_name, slug)
                  DO UPDATE SET name = EXCLUDED.name,
                                link_embed = EXCLUDED.link_embed,
                                link_m3u8 = EXCLUDED.link_m3u8,
                                position = EXCLUDED.position,
                                updated_at = now()",
            );
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MovieStore for PgMovieStore {
    fn store_name(&self) -> &str {
        "postgres"
    }

    #[instrument(skip(self, movie, episodes), fields(slug = %movie.slug, episodes = episodes.len()))]
    async fn upsert_movie(&self, movie: &Movie, episodes: &[Episode]) -> Result<UpsertOutcome, StoreError> {
        validate(movie, episodes)?;
        let mut tx = self.pool.begin().await?;

        let inserted: Option<bool> = sqlx::query_scalar(UPSERT_MOVIE)
            .bind(&movie.slug)
            .bind(&movie.name)
            .bind(&movie.origin_name)
            .bind(&movie.description)
            .bind(movie.kind.as_str())
            .bind(&movie.status)
            .bind(&movie.quality)
            .bind(&movie.language)
            .bind(movie.year)
            .bind(movie.view_count)
            .bind(Json(&movie.directors))
            .bind(Json(&movie.actors))
            .bind(Json(&movie.categories))
            .bind(Json(&movie.countries))
            .bind(&movie.episode_current)
            .bind(&movie.episode_total)
            .bind(&movie.poster_url)
            .bind(&movie.thumb_url)
            .bind(&movie.trailer_url)
            .bind(movie.modified_at)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match inserted {
            Some(true) => UpsertOutcome::Inserted,
            Some(false) => UpsertOutcome::Updated,
            None => UpsertOutcome::Unchanged,
        };

        if outcome != UpsertOutcome::Unchanged && !episodes.is_empty() {
            Self::upsert_episodes(&mut tx, episodes).await?;
        }

        tx.commit().await?;
        debug!("Upserted {} ({:?})", movie.slug, outcome);
        Ok(outcome)
    }

    async fn stored_version(&self, slug: &str) -> Result<Option<StoredVersion>, StoreError> {
        let row: Option<Option<DateTime<Utc>>> =
            sqlx::query_scalar("SELECT modified_at FROM movies WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|modified_at| StoredVersion { modified_at }))
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let (movies, episodes): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT count(*) FROM movies), (SELECT count(*) FROM episodes)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreCounts {
            movies: movies.max(0) as u64,
            episodes: episodes.max(0) as u64,
        })
    }
}
