//! Wiring the session engine to the real device and services.

use std::{
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::{Context, Result},
    tracing::{info, warn},
    underwood_config::{PreferencesStore, UnderwoodConfig},
    underwood_cron::{CrontabStore, NaturalTimeParser},
    underwood_device::{ControlByte, DeviceChannel, InputFrame, InputQueue, Pacing, serial},
    underwood_network::{GoogleGeolocator, WpaCliProvisioner},
    underwood_oauth::{CloudflaredTunnel, CredentialStore, OAuthFlow, load_oauth_config},
    underwood_session::{Collaborators, CommandComposer, Dispatcher, SessionContext, Settings},
};

/// Start the listener and process input until interrupted.
pub async fn run(config: &UnderwoodConfig, config_path: Option<&Path>) -> Result<()> {
    let (device, reader) = open_device(config)?;
    let queue = Arc::new(InputQueue::new());
    let listener = serial::spawn_listener(reader, queue.sender())
        .context("failed to start the device listener")?;

    let ctx = build_context(config, config_path, queue, device)?;
    let dispatcher = Dispatcher::new(Arc::new(ctx));

    tokio::select! {
        () = async {
            dispatcher.startup().await;
            dispatcher.run().await;
        } => {},
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("shutting down");
        },
    }

    if listener.is_finished() {
        warn!("device listener had already stopped");
    }
    Ok(())
}

/// Print one agenda without listening for input, as the scheduled job does.
pub async fn print_agenda(config: &UnderwoodConfig, config_path: Option<&Path>) -> Result<()> {
    let (device, _reader) = open_device(config)?;
    let queue = Arc::new(InputQueue::new());
    let ctx = build_context(config, config_path, queue, device)?;

    Dispatcher::new(Arc::new(ctx))
        .handle(InputFrame::control(ControlByte::GenerateAgenda))
        .await;
    Ok(())
}

fn open_device(config: &UnderwoodConfig) -> Result<(Arc<DeviceChannel>, impl Read + Send + 'static)> {
    let device = &config.device;
    let (link, reader) = serial::open(&device.port, device.baud)?;
    let pacing = Pacing::from_millis(device.char_delay_ms, device.line_delay_ms);
    Ok((Arc::new(DeviceChannel::new(link, pacing)), reader))
}

fn build_context(
    config: &UnderwoodConfig,
    config_path: Option<&Path>,
    queue: Arc<InputQueue>,
    device: Arc<DeviceChannel>,
) -> Result<SessionContext> {
    let exe = std::env::current_exe().context("cannot locate the underwood binary")?;
    let command = schedule_command(config.schedule.command.as_deref(), &exe, config_path);
    let composer = CommandComposer::new(&config.agenda.command)
        .context("set [agenda] command in underwood.toml")?;

    let tunnel = &config.tunnel;
    let collaborators = Collaborators {
        auth: Arc::new(OAuthFlow::new(load_oauth_config(&config.oauth))),
        tunnel: Arc::new(CloudflaredTunnel::new(
            tunnel.program.clone(),
            tunnel.tunnel_id.clone(),
            tunnel.run_as.clone(),
        )),
        network: Arc::new(WpaCliProvisioner::from_config(&config.network)),
        geolocator: Arc::new(GoogleGeolocator::new(config.location.api_key.clone())),
        schedule: Arc::new(CrontabStore::new(
            config.schedule.tag.clone(),
            command,
            config.schedule.user.clone(),
        )),
        time_parser: Arc::new(NaturalTimeParser),
        composer: Arc::new(composer),
    };

    Ok(SessionContext::new(
        queue,
        device,
        PreferencesStore::new(config.paths.preferences_path()),
        CredentialStore::new(config.paths.credentials_path()),
        collaborators,
        Settings::from_config(config),
    ))
}

/// The command line the daily job runs: the configured one, or this binary's
/// `agenda` subcommand with the same config file.
fn schedule_command(configured: Option<&str>, exe: &Path, config_path: Option<&Path>) -> String {
    if let Some(command) = configured.filter(|c| !c.trim().is_empty()) {
        return command.to_string();
    }
    let mut command = format!("{} agenda", exe.display());
    if let Some(path) = config_path {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| PathBuf::from(path));
        command.push_str(&format!(" --config {}", path.display()));
    }
    command
}
