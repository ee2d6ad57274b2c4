//! Config schema types for the appliance (`underwood.toml`).
use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnderwoodConfig {
    pub device: DeviceConfig,
    pub paths: PathsConfig,
    pub oauth: OAuthSection,
    pub tunnel: TunnelConfig,
    pub network: NetworkConfig,
    pub location: LocationConfig,
    pub schedule: ScheduleConfig,
    pub agenda: AgendaConfig,
    pub timeouts: TimeoutsConfig,
}

/// Serial link to the typewriter controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub port: String,
    pub baud: u32,
    /// Pause after every character, roughly 200 characters per minute by default.
    pub char_delay_ms: u64,
    /// Extra pause after each carriage return while the carriage travels back.
    pub line_delay_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".into(),
            baud: 9600,
            char_delay_ms: 200,
            line_delay_ms: 1200,
        }
    }
}

/// Locations of the persisted state files. `None` means "under the data dir".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub preferences: Option<PathBuf>,
    pub credentials: Option<PathBuf>,
}

impl PathsConfig {
    pub fn preferences_path(&self) -> PathBuf {
        self.preferences
            .clone()
            .unwrap_or_else(|| crate::data_dir().join("prefs.json"))
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials
            .clone()
            .unwrap_or_else(|| crate::data_dir().join("token.json"))
    }
}

/// OAuth client settings. Provider endpoints fall back to the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSection {
    pub client_id: String,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_secret: Option<Secret<String>>,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub revoke_url: Option<String>,
    pub profile_url: Option<String>,
    /// Redirect URI registered with the provider (the tunnel's public callback path).
    pub redirect_uri: String,
    /// Hostname the user visits to start consent; its root redirects to the provider.
    pub public_url: String,
    /// Local port the callback listener binds and the tunnel forwards to.
    pub callback_port: u16,
    /// Seconds of waiting for a callback before the user is nudged again.
    pub consent_budget_secs: u64,
}

impl Default for OAuthSection {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            auth_url: None,
            token_url: None,
            revoke_url: None,
            profile_url: None,
            redirect_uri: "https://login.underwood.today/oauth2callback".into(),
            public_url: "https://login.underwood.today".into(),
            callback_port: 8080,
            consent_budget_secs: 120,
        }
    }
}

/// External tunnel publishing the callback port under a fixed hostname.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    pub program: String,
    pub tunnel_id: String,
    /// Run the tunnel as this user via `sudo -u`.
    pub run_as: Option<String>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            program: "cloudflared".into(),
            tunnel_id: String::new(),
            run_as: None,
        }
    }
}

/// Wi-Fi provisioning through `wpa_cli`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Program used to talk to the supplicant.
    pub wpa_cli: String,
    pub interface: String,
    pub use_sudo: bool,
    /// Seconds to wait after a join request before checking the link.
    pub settle_secs: u64,
    pub probe_host: String,
    pub conf_path: PathBuf,
    pub country: String,
    pub factory_ssid: String,
    #[serde(serialize_with = "serialize_secret")]
    pub factory_psk: Secret<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wpa_cli: "wpa_cli".into(),
            interface: "wlan0".into(),
            use_sudo: true,
            settle_secs: 20,
            probe_host: "8.8.8.8".into(),
            conf_path: PathBuf::from("/etc/wpa_supplicant/wpa_supplicant.conf"),
            country: "US".into(),
            factory_ssid: "Underwood".into(),
            factory_psk: Secret::new("praxis35".into()),
        }
    }
}

/// Geolocation and reverse-geocoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub fallback_city: String,
    pub fallback_state: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            fallback_city: "Chicago".into(),
            fallback_state: "Illinois".into(),
        }
    }
}

/// Recurring agenda job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Trailing crontab comment identifying the job.
    pub tag: String,
    /// Crontab owner; `None` edits the invoking user's crontab.
    pub user: Option<String>,
    /// Command line the job runs. Defaults to this binary's `agenda` subcommand.
    pub command: Option<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tag: "generate_agenda_job".into(),
            user: None,
            command: None,
        }
    }
}

/// External agenda composer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgendaConfig {
    /// Program and arguments; the composed agenda is read from its stdout.
    pub command: Vec<String>,
}

/// Prompt deadlines, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub prompt_secs: u64,
    pub menu_secs: u64,
    pub reset_secs: u64,
    pub schedule_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            prompt_secs: 60,
            menu_secs: 30,
            reset_secs: 30,
            schedule_secs: 60,
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
