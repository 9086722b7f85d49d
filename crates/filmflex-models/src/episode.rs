use serde::{Deserialize, Serialize};

/// A normalized episode row, unique on (movie_slug, server_name, slug)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Episode {
    pub movie_slug: String,
    pub server_name: String,
    pub name: String,
    pub slug: String,
    pub link_embed: Option<String>,
    pub link_m3u8: Option<String>,
    /// Position within its server's list, starting at 0
    pub position: i32,
}

impl Episode {
    pub fn key(&self) -> (String, String, String) {
        (self.movie_slug.clone(), self.server_name.clone(), self.slug.clone())
    }
}
