pub mod error;
pub mod model;

pub use error::*;
pub use model::*;

use std::path::{Path, PathBuf};

/// Settings file name looked up in the current directory
pub const LOCAL_CONFIG_FILE: &str = "htpfleet.yaml";

/// Per-user settings directory (`~/.config/htpfleet`)
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("htpfleet"))
}

/// Decide which settings file to use
///
/// Priority:
/// 1. explicit path (`--config` / `HTPFLEET_CONFIG`)
/// 2. `htpfleet.yaml` in `cwd`
/// 3. `~/.config/htpfleet/config.yaml`
///
/// The returned path does not have to exist yet; a missing file starts the
/// interactive creation.
pub fn resolve_config_path(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let local = cwd.join(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    Ok(get_config_dir()?.join("config.yaml"))
}

/// Read and parse an existing settings file
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    tracing::debug!("Reading settings from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write settings, creating parent directories as needed
pub fn save(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = serde_yaml::to_string(config)?;
    std::fs::write(path, content)?;
    tracing::debug!("Wrote settings to {}", path.display());
    Ok(())
}
