//! Which conversation currently owns the input queue.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case", tag = "flow", content = "step")]
pub enum SessionState {
    #[default]
    Idle,
    Menu,
    Agenda,
    NetworkReset,
    Wifi(WifiStep),
    OAuth(OAuthStep),
    Schedule(ScheduleStep),
    Reset(ResetStep),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WifiStep {
    Scanning,
    PromptSsid,
    PromptPassword,
    Verifying,
    Locating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthStep {
    Checking,
    Refreshing,
    AwaitingConsent,
    Exchanging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStep {
    Choosing,
    EnteringTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetStep {
    Confirming,
    Wiping,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        *self == Self::Idle
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_flow_and_step() {
        let json = serde_json::to_value(SessionState::Wifi(WifiStep::PromptSsid)).unwrap();
        assert_eq!(json, serde_json::json!({"flow": "wifi", "step": "prompt_ssid"}));

        let idle = serde_json::to_value(SessionState::Idle).unwrap();
        assert_eq!(idle, serde_json::json!({"flow": "idle"}));
    }
}
