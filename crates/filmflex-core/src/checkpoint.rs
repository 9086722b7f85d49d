use chrono::Utc;
use filmflex_models::ImportProgress;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),
}

/// File-backed resume marker.
///
/// The marker only moves forward: completing a page at or below the stored
/// `lastCompletedPage` leaves it alone. Writes go through a temp file and a
/// rename so a crash never leaves a half-written marker.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io { path: self.path.clone(), source }
    }

    /// Current marker. A missing file is "no progress yet"; an unreadable one
    /// is backed up to `<name>.bak` and also treated as no progress.
    pub fn read_progress(&self) -> Result<Option<ImportProgress>, CheckpointError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_str::<ImportProgress>(&content) {
            Ok(progress) => Ok(Some(progress)),
            Err(e) => {
                let backup_path = self.path.with_extension("json.bak");
                if let Err(backup_err) = std::fs::copy(&self.path, &backup_path) {
                    warn!(
                        "Checkpoint {:?} is unreadable ({}) and could not be backed up: {}. Starting from page 1.",
                        self.path, e, backup_err
                    );
                } else {
                    warn!(
                        "Checkpoint {:?} is unreadable ({}). Backed up to {:?}; starting from page 1.",
                        self.path, e, backup_path
                    );
                }
                Ok(None)
            }
        }
    }

    fn write(&self, progress: &ImportProgress) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let encoded = serde_json::to_string_pretty(progress)?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, encoded).map_err(|e| self.io_error(e))?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// Record a fully processed page
    pub fn record_page_complete(&self, page: u32) -> Result<ImportProgress, CheckpointError> {
        let mut progress = self.read_progress()?.unwrap_or_else(|| ImportProgress::new(0));
        if page > progress.last_completed_page {
            progress.last_completed_page = page;
        } else {
            debug!(
                "Page {} is at or below checkpoint {}; marker unchanged",
                page, progress.last_completed_page
            );
        }
        progress.failed_pages.retain(|p| *p != page);
        progress.timestamp = Utc::now();
        self.write(&progress)?;
        Ok(progress)
    }

    /// Remember a page whose list fetch failed so it can be retried later.
    /// The marker itself does not move.
    pub fn record_page_failed(&self, page: u32) -> Result<ImportProgress, CheckpointError> {
        let mut progress = self.read_progress()?.unwrap_or_else(|| ImportProgress::new(0));
        if !progress.failed_pages.contains(&page) {
            progress.failed_pages.push(page);
            progress.failed_pages.sort_unstable();
        }
        progress.timestamp = Utc::now();
        self.write(&progress)?;
        Ok(progress)
    }

    /// Delete the marker. Returns false when there was nothing to delete.
    pub fn clear(&self) -> Result<bool, CheckpointError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed checkpoint {:?}", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_means_no_progress() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("progress.json"));
        assert!(store.read_progress().unwrap().is_none());
        assert!(!store.clear().unwrap());
    }

    #[test]
    fn test_marker_only_moves_forward() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("data").join("progress.json"));

        assert_eq!(store.record_page_complete(3).unwrap().last_completed_page, 3);
        assert_eq!(store.record_page_complete(7).unwrap().last_completed_page, 7);
        assert_eq!(store.record_page_complete(2).unwrap().last_completed_page, 7);

        let stored = store.read_progress().unwrap().unwrap();
        assert_eq!(stored.last_completed_page, 7);
        assert_eq!(stored.next_page(), 8);
    }

    #[test]
    fn test_failed_pages_tracked_and_cleared() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("progress.json"));

        store.record_page_complete(1).unwrap();
        store.record_page_failed(4).unwrap();
        store.record_page_failed(2).unwrap();
        let progress = store.record_page_failed(4).unwrap();
        assert_eq!(progress.failed_pages, vec![2, 4]);
        assert_eq!(progress.last_completed_page, 1);

        let progress = store.record_page_complete(2).unwrap();
        assert_eq!(progress.failed_pages, vec![4]);
        assert_eq!(progress.last_completed_page, 2);
    }

    #[test]
    fn test_file_format_and_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let store = CheckpointStore::new(&path);
        store.record_page_complete(1).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["lastCompletedPage"], 1);
        assert!(raw["timestamp"].is_string());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_backed_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = CheckpointStore::new(&path);
        assert!(store.read_progress().unwrap().is_none());
        assert_eq!(std::fs::read_to_string(path.with_extension("json.bak")).unwrap(), "{not json");

        assert_eq!(store.record_page_complete(1).unwrap().last_completed_page, 1);
    }

    #[test]
    fn test_clear_removes_marker() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("progress.json"));
        store.record_page_complete(5).unwrap();
        assert!(store.clear().unwrap());
        assert!(store.read_progress().unwrap().is_none());
    }
}
