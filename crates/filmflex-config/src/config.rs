use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const API_BASE_ENV: &str = "FILMFLEX_API_BASE";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Accepted values for `api.sort`
pub const SORT_MODES: &[&str] = &["modified", "modified.time", "year", "_id", "id"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote catalog API (Ophim / PhimAPI)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_list_path")]
    pub list_path: String,
    #[serde(default = "default_detail_path")]
    pub detail_path: String,
    #[serde(default = "default_sort")]
    pub sort: String,
    /// Prefix for relative image paths when the list envelope doesn't carry one
    #[serde(default)]
    pub image_base_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres DSN; `DATABASE_URL` takes precedence
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Attempts per fetch, including the first one. 1 disables retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub skip_unchanged: bool,
    /// Log a progress line every N items
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
    /// Year used when upstream has none; defaults to the current year
    #[serde(default)]
    pub fallback_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write a per-run log file next to stderr output
    #[serde(default = "default_true")]
    pub file: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://phimapi.com".to_string()
}

fn default_list_path() -> String {
    "list/movie".to_string()
}

fn default_detail_path() -> String {
    "phim".to_string()
}

fn default_sort() -> String {
    "modified".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("filmflex-importer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

fn default_progress_interval() -> usize {
    5
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            list_path: default_list_path(),
            detail_path: default_detail_path(),
            sort: default_sort(),
            image_base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            skip_unchanged: false,
            progress_interval: default_progress_interval(),
            fallback_year: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_true(),
            dir: None,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup(API_BASE_ENV).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = base.trim().to_string();
        }
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.database.url = Some(url.trim().to_string());
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let base = self.api.base_url.trim();
        if base.is_empty() {
            return Err(anyhow::anyhow!("api.base_url cannot be empty"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(anyhow::anyhow!("api.base_url must be an http(s) URL: {}", base));
        }
        if self.api.list_path.trim_matches('/').is_empty() {
            return Err(anyhow::anyhow!("api.list_path cannot be empty"));
        }
        if self.api.detail_path.trim_matches('/').is_empty() {
            return Err(anyhow::anyhow!("api.detail_path cannot be empty"));
        }
        let sort = self.api.sort.trim().to_lowercase();
        if !SORT_MODES.contains(&sort.as_str()) {
            return Err(anyhow::anyhow!(
                "api.sort must be one of {}: {}",
                SORT_MODES.join(", "),
                self.api.sort
            ));
        }
        if self.import.max_attempts == 0 {
            return Err(anyhow::anyhow!("import.max_attempts must be at least 1"));
        }
        if self.import.base_delay_ms > self.import.max_delay_ms {
            return Err(anyhow::anyhow!(
                "import.base_delay_ms ({}) cannot exceed import.max_delay_ms ({})",
                self.import.base_delay_ms,
                self.import.max_delay_ms
            ));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("database.max_connections must be at least 1"));
        }
        Ok(())
    }

    /// Database URL, or an error explaining where to set it
    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No database configured. Set {} or database.url in the config file",
                    DATABASE_URL_ENV
                )
            })
    }

    pub fn fallback_year(&self) -> i32 {
        use chrono::Datelike;
        self.import
            .fallback_year
            .unwrap_or_else(|| chrono::Utc::now().year())
    }
}
