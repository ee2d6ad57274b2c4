//! Wi-Fi provisioning through `wpa_cli`.
//!
//! New networks are added with a priority above every existing entry so the
//! supplicant prefers them. A failed join is rolled back by removing the new
//! entry and re-enabling the rest.

use std::{path::PathBuf, process::Stdio, time::Duration};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
    tokio::process::Command,
    tracing::{debug, info, warn},
    underwood_config::NetworkConfig,
};

use crate::{Error, Result, error::Context};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);
const SCAN_WAIT: Duration = Duration::from_secs(3);

/// One access point seen during a scan. Serializes in the shape the
/// geolocation API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedNetwork {
    #[serde(rename = "macAddress")]
    pub bssid: String,
    #[serde(rename = "signalStrength")]
    pub signal: i32,
    pub ssid: String,
}

/// Operations on the device's wireless configuration.
#[async_trait]
pub trait NetworkProvisioner: Send + Sync {
    async fn scan(&self) -> Result<Vec<ScannedNetwork>>;

    /// Add and enable a network entry, returning its id.
    async fn join(&self, ssid: &str, psk: &Secret<String>) -> Result<String>;

    /// Remove an entry created by [`join`](Self::join) and re-enable the others.
    async fn forget(&self, network_id: &str) -> Result<()>;

    /// SSID of the network the interface is associated with.
    async fn active_ssid(&self) -> Option<String>;

    /// Whether outbound connectivity probes succeed.
    async fn is_online(&self) -> bool;

    /// Replace the whole configuration with the factory network.
    async fn reset_to_factory(&self) -> Result<()>;
}

/// [`NetworkProvisioner`] driving `wpa_supplicant` through its CLI.
#[derive(Debug, Clone)]
pub struct WpaCliProvisioner {
    wpa_cli: String,
    interface: String,
    use_sudo: bool,
    probe_host: String,
    conf_path: PathBuf,
    country: String,
    factory_ssid: String,
    factory_psk: Secret<String>,
}

impl WpaCliProvisioner {
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            wpa_cli: config.wpa_cli.clone(),
            interface: config.interface.clone(),
            use_sudo: config.use_sudo,
            probe_host: config.probe_host.clone(),
            conf_path: config.conf_path.clone(),
            country: config.country.clone(),
            factory_ssid: config.factory_ssid.clone(),
            factory_psk: config.factory_psk.clone(),
        }
    }

    async fn wpa(&self, args: &[&str]) -> Result<String> {
        let mut full = vec!["-i", self.interface.as_str()];
        full.extend_from_slice(args);
        let stdout = self.run(&self.wpa_cli, &full).await?;
        let trimmed = stdout.trim();
        if trimmed.ends_with("FAIL") {
            return Err(Error::command(format!("wpa_cli {}", args[0]), trimmed));
        }
        Ok(stdout)
    }

    /// Credentials, a priority above every other entry, then enable and save.
    async fn configure(&self, id: &str, ssid: &str, psk: &Secret<String>) -> Result<()> {
        self.wpa(&["set_network", id, "ssid", &quote(ssid)]).await?;
        if psk.expose_secret().is_empty() {
            self.wpa(&["set_network", id, "key_mgmt", "NONE"]).await?;
        } else {
            self.wpa(&["set_network", id, "psk", &quote(psk.expose_secret())])
                .await?;
        }

        let listed = self.wpa(&["list_networks"]).await?;
        let mut max_priority = 0;
        for other in parse_network_ids(&listed) {
            if other == id {
                continue;
            }
            let raw = self.wpa(&["get_network", &other, "priority"]).await?;
            if let Ok(priority) = raw.trim().parse::<i64>() {
                max_priority = max_priority.max(priority);
            }
        }
        let priority = (max_priority + 1).to_string();
        self.wpa(&["set_network", id, "priority", &priority]).await?;

        self.wpa(&["enable_network", id]).await?;
        self.wpa(&["save_config"]).await?;
        self.wpa(&["reconfigure"]).await?;
        info!(network_id = %id, priority = %priority, "join requested");
        Ok(())
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let (program, args) = if self.use_sudo {
            let mut sudo = vec![program];
            sudo.extend_from_slice(args);
            ("sudo", sudo)
        } else {
            (program, args.to_vec())
        };
        run_command(program, &args).await
    }
}

#[async_trait]
impl NetworkProvisioner for WpaCliProvisioner {
    async fn scan(&self) -> Result<Vec<ScannedNetwork>> {
        self.wpa(&["scan"]).await?;
        tokio::time::sleep(SCAN_WAIT).await;
        let output = self.wpa(&["scan_results"]).await?;
        let networks = parse_scan_results(&output);
        info!(count = networks.len(), "wifi scan complete");
        Ok(networks)
    }

    async fn join(&self, ssid: &str, psk: &Secret<String>) -> Result<String> {
        let added = self.wpa(&["add_network"]).await?;
        let id = parse_added_id(&added).context("add_network returned no id")?;
        debug!(network_id = %id, "network entry added");

        if let Err(e) = self.configure(&id, ssid, psk).await {
            warn!(network_id = %id, error = %e, "join failed, removing entry");
            if let Err(cleanup) = self.forget(&id).await {
                warn!(network_id = %id, error = %cleanup, "failed to remove network entry");
            }
            return Err(e);
        }
        Ok(id)
    }

    async fn forget(&self, network_id: &str) -> Result<()> {
        self.wpa(&["remove_network", network_id]).await?;
        self.wpa(&["save_config"]).await?;
        self.wpa(&["enable_network", "all"]).await?;
        self.wpa(&["reconfigure"]).await?;
        info!(network_id, "network entry removed");
        Ok(())
    }

    async fn active_ssid(&self) -> Option<String> {
        match run_command("iwgetid", &["-r"]).await {
            Ok(out) => Some(out.trim().to_string()).filter(|s| !s.is_empty()),
            Err(e) => {
                debug!(error = %e, "no active network");
                None
            },
        }
    }

    async fn is_online(&self) -> bool {
        let online = run_command("ping", &["-c", "1", "-W", "3", &self.probe_host])
            .await
            .is_ok();
        debug!(online, host = %self.probe_host, "connectivity probe");
        online
    }

    async fn reset_to_factory(&self) -> Result<()> {
        let contents = render_factory_config(&self.country, &self.factory_ssid, &self.factory_psk);
        tokio::fs::write(&self.conf_path, contents)
            .await
            .with_context(|| format!("writing {}", self.conf_path.display()))?;
        self.wpa(&["reconfigure"]).await?;
        info!(ssid = %self.factory_ssid, "wifi reset to factory network");
        Ok(())
    }
}

async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    // Never log the arguments: they can carry a passphrase.
    debug!(program, subcommand = args.first().copied().unwrap_or_default(), "running");
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to run {program}"))?;

    let output = tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| Error::command(program, "timed out"))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(program, status = %output.status, stderr = %stderr, "command failed");
        return Err(Error::command(program, format!("{}: {stderr}", output.status)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Parse `wpa_cli scan_results`: `bssid / frequency / signal level / flags / ssid`.
pub fn parse_scan_results(output: &str) -> Vec<ScannedNetwork> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let bssid = fields.next()?.trim();
            if bssid.is_empty() || bssid.eq_ignore_ascii_case("bssid") || !bssid.contains(':') {
                return None;
            }
            let _frequency = fields.next()?;
            let signal = fields.next()?.trim().parse().ok()?;
            let _flags = fields.next()?;
            let ssid = fields.next()?.trim();
            if ssid.is_empty() {
                return None;
            }
            Some(ScannedNetwork {
                bssid: bssid.to_string(),
                signal,
                ssid: ssid.to_string(),
            })
        })
        .collect()
}

/// Ids from `wpa_cli list_networks`, skipping the header row.
pub fn parse_network_ids(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split('\t').next())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
        .map(ToString::to_string)
        .collect()
}

/// The id printed on the last line of `wpa_cli add_network`.
fn parse_added_id(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
        .map(ToString::to_string)
}

pub fn render_factory_config(country: &str, ssid: &str, psk: &Secret<String>) -> String {
    format!(
        "ctrl_interface=DIR=/var/run/wpa_supplicant GROUP=netdev\n\
         update_config=1\n\
         country={country}\n\
         \n\
         network={{\n    ssid={}\n    psk={}\n    key_mgmt=WPA-PSK\n}}\n",
        quote(ssid),
        quote(psk.expose_secret()),
    )
}
