pub mod config;
pub mod paths;

pub use config::{ApiConfig, Config, DatabaseConfig, ImportConfig, LoggingConfig, SORT_MODES};
pub use paths::{PathManager, container_base_path};
