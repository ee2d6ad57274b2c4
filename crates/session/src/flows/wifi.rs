//! Wi-Fi provisioning: pick a scanned network, enter its password, verify
//! the link, then locate the device and connect the account.

use {
    secrecy::Secret,
    tracing::{debug, info, warn},
    underwood_network::ScannedNetwork,
};

use crate::{
    FlowOutcome, Result,
    context::{Deadline, SessionContext},
    flows::{Notices, conclude, oauth},
    messages,
    state::{SessionState, WifiStep},
};

const NOTICES: Notices = Notices {
    flow: "wifi",
    timed_out: messages::WIFI_TIMED_OUT,
    cancelled: messages::WIFI_CANCELED,
};

pub async fn run(ctx: &SessionContext) -> Result<FlowOutcome> {
    let result = provision(ctx).await;
    conclude(ctx, result, &NOTICES).await
}

async fn provision(ctx: &SessionContext) -> Result<FlowOutcome> {
    ctx.queue.clear();
    ctx.set_state(SessionState::Wifi(WifiStep::Scanning));
    let networks = match ctx.network.scan().await {
        Ok(networks) => networks,
        Err(e) => {
            warn!(error = %e, "wifi scan failed");
            Vec::new()
        },
    };

    if ctx.load_preferences()?.first_boot {
        ctx.say(&messages::greeting()).await?;
        ctx.say(messages::WIFI_INTRO).await?;
    }

    let ssid = prompt_ssid(ctx, &networks).await?;
    join_with_password(ctx, &ssid).await?;

    locate(ctx, &networks).await?;
    oauth::run(ctx).await
}

/// Ask until the answer names a network seen in the scan.
async fn prompt_ssid(ctx: &SessionContext, networks: &[ScannedNetwork]) -> Result<String> {
    loop {
        ctx.set_state(SessionState::Wifi(WifiStep::PromptSsid));
        ctx.say(messages::ASK_SSID).await?;
        let ssid = ctx
            .answer(Deadline::after(ctx.settings.prompt_timeout))
            .await?;
        if networks.iter().any(|n| n.ssid == ssid) {
            return Ok(ssid);
        }
        debug!(ssid = %ssid, "network not in scan results");
        ctx.say(&messages::unknown_ssid(&ssid)).await?;
    }
}

/// Ask for the password until the device joins `ssid`. A failed attempt is
/// removed before the next answer is read.
async fn join_with_password(ctx: &SessionContext, ssid: &str) -> Result<()> {
    ctx.say(&messages::ask_password(ssid)).await?;
    loop {
        ctx.set_state(SessionState::Wifi(WifiStep::PromptPassword));
        let psk = Secret::new(
            ctx.answer(Deadline::after(ctx.settings.prompt_timeout))
                .await?,
        );

        ctx.set_state(SessionState::Wifi(WifiStep::Verifying));
        ctx.say(messages::CONNECTING).await?;
        match ctx.network.join(ssid, &psk).await {
            Ok(network_id) => {
                tokio::time::sleep(ctx.settings.settle_delay).await;
                if is_connected(ctx, ssid).await {
                    info!(ssid = %ssid, "wifi connected");
                    ctx.say(&messages::connected(ssid)).await?;
                    return Ok(());
                }
                warn!(ssid = %ssid, network_id = %network_id, "wifi join did not come up");
                if let Err(e) = ctx.network.forget(&network_id).await {
                    warn!(error = %e, network_id = %network_id, "failed to remove network entry");
                }
            },
            Err(e) => warn!(error = %e, ssid = %ssid, "wifi join request failed"),
        }
        ctx.say(&messages::not_connected(ssid)).await?;
    }
}

async fn is_connected(ctx: &SessionContext, ssid: &str) -> bool {
    let active = ctx.network.active_ssid().await;
    active.as_deref().is_some_and(|a| a.contains(ssid)) && ctx.network.is_online().await
}

/// Store coordinates and city/state for the agenda. The configured fallback
/// city/state is used when the lookup fails.
async fn locate(ctx: &SessionContext, networks: &[ScannedNetwork]) -> Result<()> {
    ctx.set_state(SessionState::Wifi(WifiStep::Locating));
    let coordinates = match ctx.geolocator.locate(networks).await {
        Ok(c) => Some(c),
        Err(e) => {
            warn!(error = %e, "geolocation failed");
            None
        },
    };
    let place = match coordinates {
        Some(at) => match ctx.geolocator.reverse_geocode(at).await {
            Ok(place) => place,
            Err(e) => {
                warn!(error = %e, "reverse geocoding failed");
                Default::default()
            },
        },
        None => Default::default(),
    };

    let settings = &ctx.settings;
    let prefs = ctx.update_preferences(|p| {
        if let Some(at) = coordinates {
            p.latitude = Some(at.latitude);
            p.longitude = Some(at.longitude);
        }
        p.city = Some(place.city.unwrap_or_else(|| settings.fallback_city.clone()));
        p.state = Some(place.state.unwrap_or_else(|| settings.fallback_state.clone()));
    })?;
    info!(city = ?prefs.city, state = ?prefs.state, "location saved");
    Ok(())
}
