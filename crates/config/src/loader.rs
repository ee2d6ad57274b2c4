use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    Error, Result,
    env_subst::substitute_env,
    schema::UnderwoodConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "underwood.toml",
    "underwood.yaml",
    "underwood.yml",
    "underwood.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<UnderwoodConfig> {
    let raw = std::fs::read_to_string(path)?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./underwood.{toml,yaml,yml,json}` (working directory)
/// 2. `~/.config/underwood/underwood.{toml,yaml,yml,json}` (user-global)
///
/// Returns `UnderwoodConfig::default()` if no config file is found.
pub fn discover_and_load() -> UnderwoodConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    UnderwoodConfig::default()
}

fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/underwood/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "underwood").map(|d| d.config_dir().to_path_buf())
}

/// Returns the directory holding preferences and credentials.
///
/// Falls back to `./.underwood` when no home directory can be resolved.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "underwood")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".underwood"))
}

fn parse_config(raw: &str, path: &Path) -> Result<UnderwoodConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let display = path.display().to_string();

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(display, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(display, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(display, e)),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
