//! TOML files holding a [`CacheConfig`].

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::types::CacheConfig;

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::WriteFile {
        path: path.display().to_string(),
        source,
    }
}

/// Read and validate the cache config stored at `path`.
pub fn load_config_file(path: &Path) -> Result<CacheConfig> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    let config = CacheConfig::from_toml(&text)?;
    debug!(path = %path.display(), %config, "Cache config loaded");
    Ok(config)
}

/// Write `config` to `path` as TOML, creating missing directories.
pub fn save_config(config: &CacheConfig, path: &Path) -> Result<()> {
    let text = config.to_toml()?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(write_error(dir))?;
    }
    fs::write(path, text).map_err(write_error(path))?;
    debug!(path = %path.display(), "Cache config saved");
    Ok(())
}
