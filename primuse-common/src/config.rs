//! Configuration file discovery and loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config directory (`<config_dir>/<app>/config.toml`)
//! 4. System-wide `/etc/<app>/config.toml` (Linux only)
//!
//! Finding no file is not an error: callers fall back to built-in defaults.
//! A path given explicitly (argument or environment) must exist.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Locate the TOML config file for `app`.
///
/// Returns `Ok(None)` when nothing was requested explicitly and no file exists
/// in the standard locations.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    app: &str,
) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_exists(path.to_path_buf()).map(Some);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return require_exists(PathBuf::from(path)).map(Some);
        }
    }

    // Priority 3: Per-user config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join(app).join("config.toml")) {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    // Priority 4: System-wide config (Linux)
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(app).join("config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }
    }

    debug!("No config file found for {}, using defaults", app);
    Ok(None)
}

/// Read and parse a TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let parsed = toml::from_str(&content)?;
    debug!("Loaded config from {}", path.display());
    Ok(parsed)
}

fn require_exists(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {}", path.display())))
    }
}
