use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted import checkpoint.
///
/// Serialized as `{"lastCompletedPage": n, "timestamp": "..."}`; `failedPages`
/// only appears once a page fetch has failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub last_completed_page: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_pages: Vec<u32>,
}

impl ImportProgress {
    pub fn new(last_completed_page: u32) -> Self {
        Self {
            last_completed_page,
            timestamp: Utc::now(),
            failed_pages: Vec::new(),
        }
    }

    /// First page a resume should process
    pub fn next_page(&self) -> u32 {
        self.last_completed_page.saturating_add(1)
    }
}
