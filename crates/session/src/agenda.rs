//! Printing the agenda.
//!
//! Composition itself (mail, calendar, weather and news summarized into
//! prose) happens outside this crate behind [`AgendaComposer`].

use std::{process::Stdio, time::Duration};

use {
    async_trait::async_trait,
    secrecy::Secret,
    serde::Serialize,
    tokio::{io::AsyncWriteExt, process::Command},
    tracing::{debug, info, warn},
    underwood_device::format::{is_joiner, is_pictograph},
    underwood_oauth::serialize_secret,
};

use crate::{
    Error, FlowOutcome, Result,
    context::SessionContext,
    error::Context,
    flows::{conclude, oauth, wifi},
    messages,
    state::SessionState,
};

const COMPOSE_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything the composer needs to write one agenda.
#[derive(Debug, Clone, Serialize)]
pub struct AgendaRequest {
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[async_trait]
pub trait AgendaComposer: Send + Sync {
    async fn compose(&self, request: &AgendaRequest) -> Result<String>;
}

/// Runs an external program with the request as JSON on stdin and takes
/// its stdout as the agenda.
#[derive(Debug, Clone)]
pub struct CommandComposer {
    program: String,
    args: Vec<String>,
}

impl CommandComposer {
    /// `command` is the program followed by its arguments.
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .context("no agenda command configured")?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl AgendaComposer for CommandComposer {
    async fn compose(&self, request: &AgendaRequest) -> Result<String> {
        let payload = serde_json::to_vec(request).context("serializing agenda request")?;
        debug!(program = %self.program, "running agenda composer");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to run {}", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }
        let output = tokio::time::timeout(COMPOSE_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| Error::message("agenda composer timed out"))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::message(format!(
                "agenda composer exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        let agenda = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if agenda.is_empty() {
            return Err(Error::message("agenda composer printed nothing"));
        }
        Ok(agenda)
    }
}

/// Compose and print the agenda, connecting Wi-Fi or the account first if
/// needed.
pub async fn generate(ctx: &SessionContext) -> Result<FlowOutcome> {
    ctx.set_state(SessionState::Agenda);
    ctx.say(messages::PREPARING_AGENDA).await?;

    if !ctx.network.is_online().await {
        info!("offline, setting up wifi instead of printing agenda");
        return wifi::run(ctx).await;
    }

    let credential = match oauth::authorize(ctx).await {
        Ok(authorization) => authorization.into_credential(),
        Err(e) => return conclude(ctx, Err(e), &oauth::NOTICES).await,
    };
    ctx.set_state(SessionState::Agenda);

    let prefs = ctx.load_preferences()?;
    let request = AgendaRequest {
        access_token: credential.access_token,
        given_name: prefs.given_name,
        family_name: prefs.family_name,
        city: prefs.city,
        state: prefs.state,
        latitude: prefs.latitude,
        longitude: prefs.longitude,
    };

    match ctx.composer.compose(&request).await {
        Ok(agenda) => {
            ctx.say(&tidy(&agenda)).await?;
            info!("agenda printed");
        },
        Err(e) => {
            warn!(error = %e, "agenda composition failed");
            ctx.say(messages::AGENDA_FAILED).await?;
        },
    }
    Ok(FlowOutcome::Completed)
}

/// Square brackets become parentheses, pictographs become spaces and runs of
/// spaces collapse, line by line.
pub fn tidy(text: &str) -> String {
    text.lines()
        .map(|line| {
            let replaced: String = line
                .chars()
                .filter(|&c| !is_joiner(c))
                .map(|c| match c {
                    '[' => '(',
                    ']' => ')',
                    c if is_pictograph(c) => ' ',
                    c => c,
                })
                .collect();
            replaced.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
