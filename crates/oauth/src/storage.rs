use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{Result, types::Credential};

/// File-based storage for the single appliance credential.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored credential, or `None` if absent or unreadable.
    pub fn load(&self) -> Option<Credential> {
        let path = self.path.display().to_string();
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path, "credential file not found");
                return None;
            },
            Err(e) => {
                warn!(path = %path, error = %e, "credential file read failed");
                return None;
            },
        };

        match serde_json::from_str(&data) {
            Ok(credential) => {
                debug!(path = %path, "credential loaded");
                Some(credential)
            },
            Err(e) => {
                warn!(path = %path, error = %e, "credential file parse failed");
                None
            },
        }
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        let path = self.path.display().to_string();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(credential)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &data)?;

        // Set file permissions to 0600 on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp, &self.path)?;
        info!(path = %path, "credential saved");
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "credential deleted");
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
