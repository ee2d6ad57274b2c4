//! External tunnel publishing the callback port under the public login hostname.

use std::{process::Stdio, time::Duration};

use {
    async_trait::async_trait,
    tokio::process::{Child, Command},
    tracing::{debug, info, warn},
};

use crate::{Error, Result};

const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Starts a tunnel forwarding public traffic to a local port.
#[async_trait]
pub trait TunnelLauncher: Send + Sync {
    async fn open(&self, local_port: u16) -> Result<TunnelHandle>;
}

/// A running tunnel. Closed explicitly with [`close`](Self::close); the
/// process is killed if the handle is dropped first.
#[derive(Debug)]
pub struct TunnelHandle {
    child: Option<Child>,
}

impl TunnelHandle {
    pub fn from_child(child: Child) -> Self {
        Self { child: Some(child) }
    }

    /// A handle with no process behind it, for tunnels managed elsewhere.
    pub fn detached() -> Self {
        Self { child: None }
    }

    /// Ask the process to terminate, killing it if it does not exit in time.
    pub async fn close(mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Some(pid) = child.id() {
            let _ = Command::new("kill")
                .args(["-TERM", &pid.to_string()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
        }
        match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "tunnel exited"),
            Ok(Err(e)) => warn!(error = %e, "waiting for tunnel failed"),
            Err(_) => {
                warn!("tunnel ignored SIGTERM, killing");
                let _ = child.kill().await;
            },
        }
        info!("tunnel closed");
    }
}

/// Runs `cloudflared tunnel run --url localhost:{port} <id>`, optionally as
/// another user through `sudo -u`.
#[derive(Debug, Clone)]
pub struct CloudflaredTunnel {
    program: String,
    tunnel_id: String,
    run_as: Option<String>,
}

impl CloudflaredTunnel {
    pub fn new(
        program: impl Into<String>,
        tunnel_id: impl Into<String>,
        run_as: Option<String>,
    ) -> Self {
        Self {
            program: program.into(),
            tunnel_id: tunnel_id.into(),
            run_as,
        }
    }

    /// Program and arguments for the tunnel process.
    pub fn command_line(&self, local_port: u16) -> (String, Vec<String>) {
        let mut args = vec![
            "tunnel".to_string(),
            "run".to_string(),
            "--url".to_string(),
            format!("localhost:{local_port}"),
        ];
        if !self.tunnel_id.is_empty() {
            args.push(self.tunnel_id.clone());
        }
        match &self.run_as {
            Some(user) => {
                let mut sudo = vec!["-u".to_string(), user.clone(), self.program.clone()];
                sudo.extend(args);
                ("sudo".to_string(), sudo)
            },
            None => (self.program.clone(), args),
        }
    }
}

#[async_trait]
impl TunnelLauncher for CloudflaredTunnel {
    async fn open(&self, local_port: u16) -> Result<TunnelHandle> {
        let (program, args) = self.command_line(local_port);
        debug!(cmd = %format!("{program} {}", args.join(" ")), "starting tunnel");
        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::external(format!("failed to start {program}"), e))?;
        info!(port = local_port, "tunnel started");
        Ok(TunnelHandle::from_child(child))
    }
}
