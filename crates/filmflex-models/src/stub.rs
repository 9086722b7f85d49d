use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimal movie summary as returned by a list endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieStub {
    pub slug: String,
    pub name: String,
    pub origin_name: Option<String>,
    /// Raw upstream `type` (single, series, hoathinh, tvshows)
    pub kind: Option<String>,
    pub thumb_url: Option<String>,
    pub poster_url: Option<String>,
    pub year: Option<i32>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Pagination block declared by the list endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub items_per_page: u32,
}

/// One page of stubs plus whatever paging/CDN metadata came with it
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub page: u32,
    pub stubs: Vec<MovieStub>,
    pub pagination: Option<Pagination>,
    /// Prefix for relative image paths (`pathImage` upstream)
    pub image_base: Option<String>,
}

impl CatalogPage {
    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.pagination.map(|p| p.total_pages).filter(|total| *total > 0)
    }
}
