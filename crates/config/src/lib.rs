//! Configuration loading, env substitution, and the persisted user preferences.
//!
//! Config files: `underwood.toml`, `underwood.yaml`, or `underwood.json`
//! Searched in `./` then `~/.config/underwood/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod preferences;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{config_dir, data_dir, discover_and_load, load_config},
    preferences::{Preferences, PreferencesStore},
    schema::{
        AgendaConfig, DeviceConfig, LocationConfig, NetworkConfig, OAuthSection, PathsConfig,
        ScheduleConfig, TimeoutsConfig, TunnelConfig, UnderwoodConfig,
    },
};
