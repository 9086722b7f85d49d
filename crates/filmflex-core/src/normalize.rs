//! Defensive coercion of upstream movie fields into the local schema.
//!
//! Upstream delivers the same field as an array, a JSON-encoded string, a
//! number, or null depending on the endpoint and the age of the record.
//! Every function here is total: bad input degrades to a default, it never
//! fails the record.

use chrono::Datelike;
use filmflex_models::{Episode, Movie, MovieDetail, MovieKind, MovieStub};
use serde_json::Value;
use std::collections::HashSet;

/// A normalized value, tagged with whether anything had to be salvaged
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized<T> {
    Clean(T),
    Degraded(T, String),
}

impl<T> Normalized<T> {
    pub fn value(&self) -> &T {
        match self {
            Normalized::Clean(v) | Normalized::Degraded(v, _) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Normalized::Clean(v) | Normalized::Degraded(v, _) => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Normalized::Degraded(..))
    }
}

/// A field that needed salvaging while normalizing one movie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub reason: String,
}

/// Output of [`FieldNormalizer::normalize_movie`]
#[derive(Debug, Clone)]
pub struct NormalizedMovie {
    pub movie: Movie,
    pub episodes: Vec<Episode>,
    pub issues: Vec<FieldIssue>,
}

impl NormalizedMovie {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

fn clean_entry(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize_array(items: &[Value]) -> Normalized<Vec<String>> {
    let mut out = Vec::with_capacity(items.len());
    let mut dropped = 0usize;

    for item in items {
        let entry = match item {
            Value::String(s) => clean_entry(s),
            // Categories and countries arrive as {id, name, slug}
            Value::Object(map) => map.get("name").and_then(Value::as_str).and_then(clean_entry),
            _ => None,
        };
        match entry {
            Some(entry) => out.push(entry),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        Normalized::Degraded(out, format!("dropped {} invalid entries", dropped))
    } else {
        Normalized::Clean(out)
    }
}

/// Normalize a list-of-strings field (categories, countries, directors, actors).
///
/// * array: string entries kept in order, `{name}` objects contribute the
///   name, everything else dropped
/// * string: decoded as JSON when it holds an array, otherwise kept whole
///   as a single entry
/// * null: empty list
pub fn normalize_string_list(value: &Value) -> Normalized<Vec<String>> {
    match value {
        Value::Null => Normalized::Clean(Vec::new()),
        Value::Array(items) => normalize_array(items),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Normalized::Clean(Vec::new());
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Array(items)) => normalize_array(&items),
                Ok(Value::String(inner)) => match clean_entry(&inner) {
                    Some(entry) => Normalized::Clean(vec![entry]),
                    None => Normalized::Clean(Vec::new()),
                },
                Ok(Value::Null) => Normalized::Degraded(Vec::new(), "JSON null encoded as string".to_string()),
                Ok(_) | Err(_) => Normalized::Degraded(
                    vec![trimmed.to_string()],
                    "string is not a JSON array; kept as a single entry".to_string(),
                ),
            }
        }
        Value::Object(map) => match map.get("name").and_then(Value::as_str).and_then(clean_entry) {
            Some(name) => Normalized::Degraded(vec![name], "single object instead of a list".to_string()),
            None => Normalized::Degraded(Vec::new(), "object without a name".to_string()),
        },
        Value::Number(_) | Value::Bool(_) => {
            Normalized::Degraded(Vec::new(), format!("unexpected scalar {}", value))
        }
    }
}

fn parse_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

/// Release year, falling back when absent, unparseable or implausible
pub fn normalize_year(value: &Value, fallback: i32, max_year: i32) -> Normalized<i32> {
    if value.is_null() {
        return Normalized::Degraded(fallback, "missing year".to_string());
    }
    match parse_i64(value) {
        Some(year) if (1870..=max_year as i64).contains(&year) => Normalized::Clean(year as i32),
        Some(year) => Normalized::Degraded(fallback, format!("year {} out of range", year)),
        None => Normalized::Degraded(fallback, format!("unparseable year {}", value)),
    }
}

/// Non-negative counter such as view count; absent means zero
pub fn normalize_count(value: &Value) -> Normalized<i64> {
    if value.is_null() {
        return Normalized::Clean(0);
    }
    match parse_i64(value) {
        Some(n) if n >= 0 => Normalized::Clean(n),
        Some(n) => Normalized::Degraded(0, format!("negative count {}", n)),
        None => Normalized::Degraded(0, format!("unparseable count {}", value)),
    }
}

/// Trimmed text, or None when blank
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value.and_then(clean_entry)
}

/// Short labels like `episode_total` that arrive as either strings or numbers
pub fn normalize_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_entry(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First integer inside a label: "16 Tập" -> 16, "Hoàn Tất (12/12)" -> 12
pub fn parse_episode_count(label: &str) -> Option<u32> {
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Resolve an image reference against the CDN base
pub fn normalize_image_url(raw: Option<&str>, image_base: Option<&str>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    match image_base.map(str::trim).filter(|b| !b.is_empty()) {
        Some(base) => Some(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            raw.trim_start_matches('/')
        )),
        None => Some(raw.to_string()),
    }
}

const VIETNAMESE_FOLDS: &[(&str, char)] = &[
    ("àáạảãâầấậẩẫăằắặẳẵ", 'a'),
    ("èéẹẻẽêềếệểễ", 'e'),
    ("ìíịỉĩ", 'i'),
    ("òóọỏõôồốộổỗơờớợởỡ", 'o'),
    ("ùúụủũưừứựửữ", 'u'),
    ("ỳýỵỷỹ", 'y'),
    ("đ", 'd'),
];

fn fold_char(c: char) -> char {
    VIETNAMESE_FOLDS
        .iter()
        .find(|(group, _)| group.contains(c))
        .map(|(_, base)| *base)
        .unwrap_or(c)
}

/// URL-safe slug: "Tập 01" -> "tap-01"
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.trim().chars().flat_map(char::to_lowercase).map(fold_char) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Converts upstream details into storable rows
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    fallback_year: i32,
    max_year: i32,
    image_base: Option<String>,
}

impl FieldNormalizer {
    pub fn new(fallback_year: i32) -> Self {
        Self {
            fallback_year,
            max_year: chrono::Utc::now().year() + 5,
            image_base: None,
        }
    }

    /// Image prefix used when the page envelope doesn't provide one
    pub fn with_image_base(mut self, image_base: Option<String>) -> Self {
        self.image_base = image_base;
        self
    }

    fn infer_kind(detail: &MovieDetail, stub: Option<&MovieStub>, episode_total: Option<&str>) -> MovieKind {
        if let Some(kind) = detail.kind.as_deref().and_then(MovieKind::from_upstream) {
            return kind;
        }
        if let Some(kind) = stub.and_then(|s| s.kind.as_deref()).and_then(MovieKind::from_upstream) {
            return kind;
        }
        let declared_many = episode_total.and_then(parse_episode_count).is_some_and(|n| n > 1);
        let listed_many = detail.servers.iter().any(|s| s.episodes.len() > 1);
        if declared_many || listed_many {
            MovieKind::Series
        } else {
            MovieKind::Single
        }
    }

    fn normalize_episodes(&self, slug: &str, detail: &MovieDetail, issues: &mut Vec<FieldIssue>) -> Vec<Episode> {
        let mut seen = HashSet::new();
        let mut episodes = Vec::new();

        for server in &detail.servers {
            let server_name = server.server_name.trim().to_string();
            if server.episodes.is_empty() {
                issues.push(FieldIssue {
                    field: "episodes",
                    reason: format!("{}: server lists no episodes", server_name),
                });
                continue;
            }
            for (position, raw) in server.episodes.iter().enumerate() {
                let name = normalize_text(raw.name.as_deref())
                    .or_else(|| normalize_text(raw.filename.as_deref()));
                let episode_slug = normalize_text(raw.slug.as_deref())
                    .or_else(|| name.as_deref().map(slugify).filter(|s| !s.is_empty()));

                let Some(episode_slug) = episode_slug else {
                    issues.push(FieldIssue {
                        field: "episodes",
                        reason: format!("{}: episode #{} has no slug or name", server_name, position + 1),
                    });
                    continue;
                };

                if !seen.insert((server_name.clone(), episode_slug.clone())) {
                    issues.push(FieldIssue {
                        field: "episodes",
                        reason: format!("{}: duplicate episode '{}'", server_name, episode_slug),
                    });
                    continue;
                }

                episodes.push(Episode {
                    movie_slug: slug.to_string(),
                    server_name: server_name.clone(),
                    name: name.unwrap_or_else(|| episode_slug.clone()),
                    slug: episode_slug,
                    link_embed: normalize_text(raw.link_embed.as_deref()),
                    link_m3u8: normalize_text(raw.link_m3u8.as_deref()),
                    position: position as i32,
                });
            }
        }

        episodes
    }

    /// Normalize one detail. `stub` supplies fallbacks (kind, modified time,
    /// images); `page_image_base` comes from the list envelope.
    pub fn normalize_movie(
        &self,
        detail: &MovieDetail,
        stub: Option<&MovieStub>,
        page_image_base: Option<&str>,
    ) -> NormalizedMovie {
        let mut issues = Vec::new();
        let mut take = |field: &'static str, normalized: Normalized<Vec<String>>| match normalized {
            Normalized::Clean(v) => v,
            Normalized::Degraded(v, reason) => {
                issues.push(FieldIssue { field, reason });
                v
            }
        };

        let directors = take("directors", normalize_string_list(&detail.directors));
        let actors = take("actors", normalize_string_list(&detail.actors));
        let categories = take("categories", normalize_string_list(&detail.categories));
        let countries = take("countries", normalize_string_list(&detail.countries));

        let year = match normalize_year(&detail.year, self.fallback_year, self.max_year) {
            Normalized::Clean(y) => y,
            Normalized::Degraded(y, reason) => {
                // The list entry often carries the year when the detail doesn't
                match stub.and_then(|s| s.year).filter(|y| (1870..=self.max_year).contains(y)) {
                    Some(stub_year) => stub_year,
                    None => {
                        issues.push(FieldIssue { field: "year", reason });
                        y
                    }
                }
            }
        };

        let view_count = match normalize_count(&detail.view) {
            Normalized::Clean(v) => v,
            Normalized::Degraded(v, reason) => {
                issues.push(FieldIssue { field: "view_count", reason });
                v
            }
        };

        let slug = detail.slug.trim().to_string();
        let name = normalize_text(detail.name.as_deref())
            .or_else(|| stub.and_then(|s| normalize_text(Some(&s.name))))
            .unwrap_or_else(|| {
                issues.push(FieldIssue { field: "name", reason: "missing name; using slug".to_string() });
                slug.clone()
            });

        let episode_current = normalize_label(&detail.episode_current);
        let episode_total = normalize_label(&detail.episode_total);
        let kind = Self::infer_kind(detail, stub, episode_total.as_deref());

        let image_base = page_image_base.or(self.image_base.as_deref());
        let poster_url = normalize_image_url(
            detail.poster_url.as_deref().or(stub.and_then(|s| s.poster_url.as_deref())),
            image_base,
        );
        let thumb_url = normalize_image_url(
            detail.thumb_url.as_deref().or(stub.and_then(|s| s.thumb_url.as_deref())),
            image_base,
        );

        let episodes = self.normalize_episodes(&slug, detail, &mut issues);

        let movie = Movie {
            slug,
            name,
            origin_name: normalize_text(detail.origin_name.as_deref()),
            description: normalize_text(detail.content.as_deref()),
            kind,
            status: normalize_text(detail.status.as_deref()),
            quality: normalize_text(detail.quality.as_deref()),
            language: normalize_text(detail.lang.as_deref()),
            year,
            view_count,
            directors,
            actors,
            categories,
            countries,
            episode_current,
            episode_total,
            poster_url,
            thumb_url,
            trailer_url: normalize_image_url(detail.trailer_url.as_deref(), None),
            modified_at: detail.modified_at.or(stub.and_then(|s| s.modified_at)),
        };

        NormalizedMovie { movie, episodes, issues }
    }
}
