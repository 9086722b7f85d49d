use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Full upstream movie record, before normalization.
///
/// Fields that upstream delivers in more than one shape (arrays, JSON
/// encoded strings, numbers as strings, nulls) are kept as raw JSON values
/// so the normalizer can decide what to salvage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MovieDetail {
    pub slug: String,
    pub name: Option<String>,
    pub origin_name: Option<String>,
    pub content: Option<String>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub quality: Option<String>,
    pub lang: Option<String>,
    pub year: Value,
    pub view: Value,
    pub directors: Value,
    pub actors: Value,
    pub categories: Value,
    pub countries: Value,
    pub episode_current: Value,
    pub episode_total: Value,
    pub poster_url: Option<String>,
    pub thumb_url: Option<String>,
    pub trailer_url: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub servers: Vec<EpisodeServer>,
}

/// One streaming server and its ordered episode list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EpisodeServer {
    pub server_name: String,
    pub episodes: Vec<ServerEpisode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServerEpisode {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub filename: Option<String>,
    pub link_embed: Option<String>,
    pub link_m3u8: Option<String>,
}

impl MovieDetail {
    pub fn episode_count(&self) -> usize {
        self.servers.iter().map(|s| s.episodes.len()).sum()
    }
}
