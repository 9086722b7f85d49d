use chrono::{DateTime, NaiveDateTime, Utc};
use filmflex_models::{CatalogPage, EpisodeServer, MovieDetail, MovieStub, Pagination, ServerEpisode};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};
use crate::SourceError;

/// Accept strings and numbers, treat everything else as absent
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct ApiStub {
    #[serde(default, deserialize_with = "lenient_string")]
    slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    origin_name: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    thumb_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    poster_url: Option<String>,
    #[serde(default)]
    year: Value,
    #[serde(default)]
    modified: Value,
}

#[derive(Debug, Deserialize)]
struct ApiMovie {
    #[serde(default, deserialize_with = "lenient_string")]
    slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    origin_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    content: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    quality: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    lang: Option<String>,
    #[serde(default)]
    year: Value,
    #[serde(default)]
    view: Value,
    #[serde(default)]
    director: Value,
    #[serde(default)]
    actor: Value,
    #[serde(default)]
    category: Value,
    #[serde(default)]
    country: Value,
    #[serde(default)]
    episode_current: Value,
    #[serde(default)]
    episode_total: Value,
    #[serde(default, deserialize_with = "lenient_string")]
    poster_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    thumb_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    trailer_url: Option<String>,
    #[serde(default)]
    modified: Value,
    /// The v1 envelope nests episodes inside the item
    #[serde(default)]
    episodes: Value,
}

#[derive(Debug, Deserialize)]
struct ApiServer {
    #[serde(default, deserialize_with = "lenient_string")]
    server_name: Option<String>,
    /// Null on servers that have been emptied upstream
    #[serde(default)]
    server_data: Value,
}

#[derive(Debug, Deserialize)]
struct ApiServerEpisode {
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    filename: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    link_embed: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    link_m3u8: Option<String>,
}

/// Parse upstream timestamps: RFC 3339, or a bare `YYYY-MM-DD HH:MM:SS` taken as UTC
pub fn parse_upstream_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `modified` is usually `{time: ...}` but older records carry a bare string
fn modified_time(modified: &Value) -> Option<DateTime<Utc>> {
    match modified {
        Value::Object(_) => modified.get("time").and_then(Value::as_str).and_then(parse_upstream_time),
        Value::String(raw) => parse_upstream_time(raw),
        _ => None,
    }
}

fn lenient_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Out-of-range counts are treated as absent
fn lenient_u32(value: Option<&Value>) -> u32 {
    lenient_u64(value).and_then(|n| u32::try_from(n).ok()).unwrap_or(0)
}

fn parse_pagination(value: &Value) -> Option<Pagination> {
    if !value.is_object() {
        return None;
    }
    Some(Pagination {
        current_page: lenient_u32(value.get("currentPage")),
        total_pages: lenient_u32(value.get("totalPages")),
        total_items: lenient_u64(value.get("totalItems")).unwrap_or(0),
        items_per_page: lenient_u32(value.get("totalItemsPerPage")),
    })
}

fn parse_stub(value: Value) -> Option<MovieStub> {
    let stub: ApiStub = match serde_json::from_value(value) {
        Ok(stub) => stub,
        Err(e) => {
            warn!("Dropping undecodable list entry: {}", e);
            return None;
        }
    };
    let slug = stub.slug.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let Some(slug) = slug else {
        warn!("Dropping list entry without slug (name: {:?})", stub.name);
        return None;
    };

    let year = match &stub.year {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    Some(MovieStub {
        name: stub.name.unwrap_or_else(|| slug.clone()),
        slug,
        origin_name: stub.origin_name,
        kind: stub.kind,
        thumb_url: stub.thumb_url,
        poster_url: stub.poster_url,
        year,
        modified_at: modified_time(&stub.modified),
    })
}

/// Decode a list response. Accepts both the flat (`items`, `pagination`,
/// `pathImage`) and the nested v1 (`data.items`, `data.params.pagination`,
/// `data.APP_DOMAIN_CDN_IMAGE`) envelopes.
pub fn parse_list_envelope(page: u32, body: Value, url: &str) -> Result<CatalogPage, SourceError> {
    let items = body
        .get("items")
        .or_else(|| body.pointer("/data/items"))
        .cloned()
        .ok_or_else(|| SourceError::Decode {
            url: url.to_string(),
            message: "response has no items array".to_string(),
        })?;

    let Value::Array(entries) = items else {
        return Err(SourceError::Decode {
            url: url.to_string(),
            message: "items is not an array".to_string(),
        });
    };

    let pagination = body
        .get("pagination")
        .or_else(|| body.pointer("/data/params/pagination"))
        .and_then(parse_pagination);

    let image_base = body
        .get("pathImage")
        .or_else(|| body.pointer("/data/APP_DOMAIN_CDN_IMAGE"))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let total = entries.len();
    let stubs: Vec<MovieStub> = entries.into_iter().filter_map(parse_stub).collect();
    if stubs.len() < total {
        debug!("Page {}: kept {} of {} list entries", page, stubs.len(), total);
    }

    Ok(CatalogPage { page, stubs, pagination, image_base })
}

fn parse_servers(value: &Value) -> Vec<EpisodeServer> {
    let Value::Array(servers) = value else {
        return Vec::new();
    };

    servers
        .iter()
        .filter_map(|raw| match serde_json::from_value::<ApiServer>(raw.clone()) {
            Ok(server) => Some(server),
            Err(e) => {
                debug!("Skipping undecodable episode server: {}", e);
                None
            }
        })
        .map(|server| EpisodeServer {
            server_name: server
                .server_name
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "default".to_string()),
            episodes: parse_server_episodes(server.server_data),
        })
        .collect()
}

fn parse_server_episodes(server_data: Value) -> Vec<ServerEpisode> {
    let Value::Array(entries) = server_data else {
        return Vec::new();
    };
    entries
        .into_iter()
        .filter_map(|raw| serde_json::from_value::<ApiServerEpisode>(raw).ok())
        .map(|ep| ServerEpisode {
            name: ep.name,
            slug: ep.slug,
            filename: ep.filename,
            link_embed: ep.link_embed,
            link_m3u8: ep.link_m3u8,
        })
        .collect()
}

/// Decode a detail response. A missing or non-object `movie` is malformed.
pub fn parse_detail_envelope(slug: &str, body: Value) -> Result<MovieDetail, SourceError> {
    let (movie_value, episodes_value) = match body.get("movie") {
        Some(movie) => (movie.clone(), body.get("episodes").cloned().unwrap_or(Value::Null)),
        None => match body.pointer("/data/item") {
            Some(item) => (item.clone(), Value::Null),
            None => return Err(SourceError::malformed(slug, "response has no movie object")),
        },
    };

    if !movie_value.is_object() {
        return Err(SourceError::malformed(slug, "movie is not an object"));
    }

    let movie: ApiMovie = serde_json::from_value(movie_value)
        .map_err(|e| SourceError::malformed(slug, format!("movie object did not decode: {}", e)))?;

    if let Some(upstream_slug) = movie.slug.as_deref() {
        if upstream_slug != slug {
            debug!("Detail for '{}' reports slug '{}'; keeping the requested one", slug, upstream_slug);
        }
    }

    let servers = if episodes_value.is_null() {
        parse_servers(&movie.episodes)
    } else {
        parse_servers(&episodes_value)
    };

    Ok(MovieDetail {
        slug: slug.to_string(),
        name: movie.name,
        origin_name: movie.origin_name,
        content: movie.content,
        kind: movie.kind,
        status: movie.status,
        quality: movie.quality,
        lang: movie.lang,
        year: movie.year,
        view: movie.view,
        directors: movie.director,
        actors: movie.actor,
        categories: movie.category,
        countries: movie.country,
        episode_current: movie.episode_current,
        episode_total: movie.episode_total,
        poster_url: movie.poster_url,
        thumb_url: movie.thumb_url,
        trailer_url: movie.trailer_url,
        modified_at: modified_time(&movie.modified),
        servers,
    })
}
