pub mod clear;
pub mod config;
pub mod import;
pub mod import_ui;
pub mod status;

use color_eyre::Result;
use filmflex_config::Config;
use std::path::Path;

/// Load the config file (defaults when absent), apply env overrides, validate
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", path.display(), e))?;
    config.apply_env_overrides();
    config
        .validate()
        .map_err(|e| color_eyre::eyre::eyre!("Invalid configuration in {}: {}", path.display(), e))?;
    Ok(config)
}
