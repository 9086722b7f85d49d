use anyhow::Result;
use std::path::{Path, PathBuf};

/// Get the container base path from environment variable, defaulting to "/app"
pub fn container_base_path() -> PathBuf {
    std::env::var("FILMFLEX_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/app"))
}

#[derive(Debug, Clone)]
pub struct PathManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("filmflex");

        Ok(Self::rooted_at(base_dir))
    }

    /// Config at the base, data and logs in subdirectories
    pub fn rooted_at(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            config_dir: base.clone(),
            data_dir: base.join("data"),
            log_dir: base.join("logs"),
        }
    }

    pub fn from_docker_env() -> Self {
        Self::rooted_at(container_base_path())
    }

    /// Send run logs somewhere other than `<base>/logs`
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn progress_file(&self) -> PathBuf {
        self.data_dir.join("progress.json")
    }

    /// Log file for a single run; a fresh name per invocation
    pub fn run_log_file(&self, started_at: chrono::DateTime<chrono::Utc>) -> PathBuf {
        self.log_dir
            .join(format!("import-{}.log", started_at.format("%Y%m%dT%H%M%SZ")))
    }
}

impl Default for PathManager {
    fn default() -> Self {
        // The container image creates the base directory; its presence means we run in Docker
        let base = container_base_path();
        if base.exists() {
            return Self::from_docker_env();
        }

        Self::new().unwrap_or_else(|_| Self::from_docker_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rooted_layout() {
        let paths = PathManager::rooted_at("/srv/filmflex");
        assert_eq!(paths.config_file(), PathBuf::from("/srv/filmflex/config.toml"));
        assert_eq!(paths.progress_file(), PathBuf::from("/srv/filmflex/data/progress.json"));

        let started = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            paths.run_log_file(started),
            PathBuf::from("/srv/filmflex/logs/import-20240309T070501Z.log")
        );

        let moved = paths.with_log_dir("/var/log/filmflex");
        assert_eq!(
            moved.run_log_file(started),
            PathBuf::from("/var/log/filmflex/import-20240309T070501Z.log")
        );
        assert_eq!(moved.progress_file(), PathBuf::from("/srv/filmflex/data/progress.json"));
    }
}
