// src/config/loader.rs

use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;
use crate::fs::FileSystem;

pub const DEFAULT_CONFIG_FILE: &str = "filer.toml";

/// Load a configuration file and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** validate build
/// configs. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>, fs: &dyn FileSystem) -> Result<RawConfigFile> {
    let contents = fs.read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file and validate it.
///
/// Relative paths in the file (the source directory, literal build inputs)
/// are anchored at the directory containing the config file.
pub fn load_and_validate(path: impl AsRef<Path>, fs: &dyn FileSystem) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw = load_from_path(path, fs)?;
    ConfigFile::from_raw(raw, &config_root_dir(path), fs)
}

/// Directory that relative config paths are resolved against.
///
/// A bare filename like `filer.toml` resolves against the current working
/// directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    let parent = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if parent.is_absolute() {
        parent
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&parent))
            .unwrap_or(parent)
    }
}
