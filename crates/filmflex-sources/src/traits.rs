use async_trait::async_trait;
use filmflex_models::{CatalogPage, MovieDetail};
use std::fmt;
use std::str::FromStr;
use crate::SourceError;

/// Ordering requested from the list endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortMode {
    Modified,
    Year,
    Id,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Modified => "modified",
            SortMode::Year => "year",
            SortMode::Id => "_id",
        }
    }
}

impl Default for SortMode {
    fn default() -> Self {
        SortMode::Modified
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "modified" | "modified.time" => Ok(SortMode::Modified),
            "year" => Ok(SortMode::Year),
            "_id" | "id" => Ok(SortMode::Id),
            other => Err(format!("Invalid sort mode: {}. Use 'modified', 'year' or 'id'", other)),
        }
    }
}

/// A read-only remote movie catalog
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn source_name(&self) -> &str;

    /// One page of stubs. Never retries; that's the caller's policy.
    async fn fetch_page(&self, page: u32, sort: &SortMode) -> Result<CatalogPage, SourceError>;

    /// Full detail for one slug, including episode servers
    async fn fetch_detail(&self, slug: &str) -> Result<MovieDetail, SourceError>;

    /// Cheap reachability probe
    async fn health_check(&self) -> Result<(), SourceError> {
        Ok(())
    }
}
