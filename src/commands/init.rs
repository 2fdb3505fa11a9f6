//! Init command - write a default configuration

use crate::config::Config;
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::info;

/// Write the default config into `base_dir` (or `~/.review-watch`)
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<Config> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.is_initialized() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {} (use --force to overwrite)",
            config.paths.config_file.display()
        )));
    }

    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.save()?;
    info!("Initialized review-watch in {:?}", config.paths.base_dir);

    Ok(config)
}
