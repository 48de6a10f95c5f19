//! Configuration file support for the zipfold CLI.
//!
//! The file is looked up in this order:
//!
//! 1. `--config <FILE>` (must exist)
//! 2. `$ZIPFOLD_CONFIG_DIR/config.toml`
//! 3. `~/.config/zipfold/config.toml` (XDG) or
//!    `~/Library/Application Support/zipfold/config.toml` on macOS
//!
//! A missing file in 2 or 3 means defaults. Every key is optional:
//!
//! ```toml
//! small_file_cache_bytes = 536870912
//! small_file_cutoff_bytes = 16777216
//! large_file_dir = "/var/tmp/zipfold"
//! max_readers_per_archive = 8
//! compact_interval = "1m"
//! folder_metadata = true
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use zipfold_core::FsConfig;

/// Overrides the directory holding `config.toml`.
pub const CONFIG_DIR_ENV: &str = "ZIPFOLD_CONFIG_DIR";

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config file {}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: zipfold_core::ConfigError,
    },
}

/// Loads and validates the filesystem configuration.
pub fn load(explicit: Option<&Path>) -> Result<FsConfig, ConfigFileError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(FsConfig::default()),
        },
    };

    if !required && !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(FsConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigFileError::Read {
        path: path.clone(),
        source,
    })?;
    let config = parse(&content).map_err(|source| ConfigFileError::Parse {
        path: path.clone(),
        source,
    })?;
    config
        .validate()
        .map_err(|source| ConfigFileError::Invalid { path: path.clone(), source })?;
    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

fn parse(content: &str) -> Result<FsConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Get the path to the configuration file.
///
/// Uses XDG config directory on Linux, Application Support on macOS.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir).join(CONFIG_FILE_NAME));
    }

    let base_dirs = directories::BaseDirs::new()?;

    #[cfg(target_os = "macos")]
    let config_dir = base_dirs.home_dir().join("Library/Application Support/zipfold");

    #[cfg(not(target_os = "macos"))]
    let config_dir = base_dirs.config_dir().join("zipfold");

    Some(config_dir.join(CONFIG_FILE_NAME))
}
