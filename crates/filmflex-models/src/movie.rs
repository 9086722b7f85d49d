use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a title is a single-episode film or a multi-episode series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MovieKind {
    Single,
    Series,
}

impl MovieKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovieKind::Single => "single",
            MovieKind::Series => "series",
        }
    }

    /// Map an upstream `type` value. Returns None for values that don't say
    /// which of the two it is, so the caller can infer from episode data.
    pub fn from_upstream(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "single" | "movie" => Some(MovieKind::Single),
            "series" | "tvshows" | "hoathinh" => Some(MovieKind::Series),
            _ => None,
        }
    }
}

/// A normalized movie, shaped like a row of the `movies` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub slug: String,
    pub name: String,
    pub origin_name: Option<String>,
    pub description: Option<String>,
    pub kind: MovieKind,
    pub status: Option<String>,
    pub quality: Option<String>,
    pub language: Option<String>,
    pub year: i32,
    pub view_count: i64,
    pub directors: Vec<String>,
    pub actors: Vec<String>,
    pub categories: Vec<String>,
    pub countries: Vec<String>,
    pub episode_current: Option<String>,
    pub episode_total: Option<String>,
    pub poster_url: Option<String>,
    pub thumb_url: Option<String>,
    pub trailer_url: Option<String>,
    /// Upstream last-modified time; newer values win on conflict
    pub modified_at: Option<DateTime<Utc>>,
}
