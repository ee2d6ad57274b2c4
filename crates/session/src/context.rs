//! Everything a flow needs, passed explicitly instead of held in globals.

use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use {
    tokio::time::Instant,
    tracing::debug,
    underwood_config::{Preferences, PreferencesStore, UnderwoodConfig},
    underwood_cron::{ScheduleStore, TimeParser},
    underwood_device::{ControlByte, DeviceChannel, InputQueue},
    underwood_network::{Geolocator, NetworkProvisioner},
    underwood_oauth::{AuthProvider, CredentialStore, TunnelLauncher},
};

use crate::{
    Result,
    agenda::AgendaComposer,
    error::Interrupt,
    state::SessionState,
};

/// A fixed point in time after which a pending wait is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now() + budget)
    }

    pub fn instant(self) -> Instant {
        self.0
    }

    pub fn remaining(self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    pub fn has_passed(self) -> bool {
        Instant::now() >= self.0
    }
}

/// Timeouts and fixed values the flows read.
#[derive(Debug, Clone)]
pub struct Settings {
    pub prompt_timeout: Duration,
    pub menu_timeout: Duration,
    pub reset_timeout: Duration,
    /// Shared by every prompt of one scheduling conversation.
    pub schedule_timeout: Duration,
    /// Pause between a join request and checking the link.
    pub settle_delay: Duration,
    /// Wait for a consent callback before nudging the user again.
    pub consent_budget: Duration,
    pub callback_port: u16,
    pub public_url: String,
    pub fallback_city: String,
    pub fallback_state: String,
}

impl Settings {
    pub fn from_config(config: &UnderwoodConfig) -> Self {
        let t = &config.timeouts;
        Self {
            prompt_timeout: Duration::from_secs(t.prompt_secs),
            menu_timeout: Duration::from_secs(t.menu_secs),
            reset_timeout: Duration::from_secs(t.reset_secs),
            schedule_timeout: Duration::from_secs(t.schedule_secs),
            settle_delay: Duration::from_secs(config.network.settle_secs),
            consent_budget: Duration::from_secs(config.oauth.consent_budget_secs),
            callback_port: config.oauth.callback_port,
            public_url: config.oauth.public_url.clone(),
            fallback_city: config.location.fallback_city.clone(),
            fallback_state: config.location.fallback_state.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&UnderwoodConfig::default())
    }
}

/// External services behind the flows.
pub struct Collaborators {
    pub auth: Arc<dyn AuthProvider>,
    pub tunnel: Arc<dyn TunnelLauncher>,
    pub network: Arc<dyn NetworkProvisioner>,
    pub geolocator: Arc<dyn Geolocator>,
    pub schedule: Arc<dyn ScheduleStore>,
    pub time_parser: Arc<dyn TimeParser>,
    pub composer: Arc<dyn AgendaComposer>,
}

pub struct SessionContext {
    pub queue: Arc<InputQueue>,
    pub device: Arc<DeviceChannel>,
    pub preferences: PreferencesStore,
    pub credentials: CredentialStore,
    pub auth: Arc<dyn AuthProvider>,
    pub tunnel: Arc<dyn TunnelLauncher>,
    pub network: Arc<dyn NetworkProvisioner>,
    pub geolocator: Arc<dyn Geolocator>,
    pub schedule: Arc<dyn ScheduleStore>,
    pub time_parser: Arc<dyn TimeParser>,
    pub composer: Arc<dyn AgendaComposer>,
    pub settings: Settings,
    state: RwLock<SessionState>,
}

impl SessionContext {
    pub fn new(
        queue: Arc<InputQueue>,
        device: Arc<DeviceChannel>,
        preferences: PreferencesStore,
        credentials: CredentialStore,
        collaborators: Collaborators,
        settings: Settings,
    ) -> Self {
        let Collaborators {
            auth,
            tunnel,
            network,
            geolocator,
            schedule,
            time_parser,
            composer,
        } = collaborators;
        Self {
            queue,
            device,
            preferences,
            credentials,
            auth,
            tunnel,
            network,
            geolocator,
            schedule,
            time_parser,
            composer,
            settings,
            state: RwLock::new(SessionState::Idle),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_state(&self, next: SessionState) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state != next {
            debug!(from = ?*state, to = ?next, "session state");
            *state = next;
        }
    }

    /// Print `text` on the device. Returns once the last character is out.
    pub async fn say(&self, text: &str) -> Result<()> {
        self.device.send_text(text).await?;
        Ok(())
    }

    /// Wait for the next typed answer.
    ///
    /// A cancel frame yields [`Interrupt::Cancelled`]; any other control byte
    /// yields [`Interrupt::Preempted`].
    pub async fn answer(&self, deadline: Deadline) -> Result<String> {
        let frame = self
            .queue
            .get(deadline.instant())
            .await
            .map_err(|_| Interrupt::TimedOut)?;
        match frame.control_byte() {
            Some(ControlByte::Cancel) => Err(Interrupt::Cancelled.into()),
            Some(other) => Err(Interrupt::Preempted(other).into()),
            None => Ok(frame.text()),
        }
    }

    pub fn load_preferences(&self) -> Result<Preferences> {
        Ok(self.preferences.load()?)
    }

    pub fn update_preferences(&self, f: impl FnOnce(&mut Preferences)) -> Result<Preferences> {
        Ok(self.preferences.update(f)?)
    }
}
