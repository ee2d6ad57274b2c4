//! Account authorization.
//!
//! A stored credential is used as is while fresh, refreshed once when stale,
//! and otherwise replaced through browser consent: a local callback listener
//! published by a tunnel, with the user walked through it on the device.

use {
    tracing::{debug, info, warn},
    underwood_device::ControlByte,
    underwood_oauth::{CallbackServer, Credential, unix_now},
};

use crate::{
    FlowOutcome, Interrupt, Result,
    context::{Deadline, SessionContext},
    flows::{Notices, conclude, schedule},
    messages,
    state::{OAuthStep, SessionState},
};

pub(crate) const NOTICES: Notices = Notices {
    flow: "oauth",
    timed_out: messages::CONSENT_TIMED_OUT,
    cancelled: messages::CONSENT_CANCELED,
};

/// Where the usable credential came from.
#[derive(Debug)]
pub enum Authorization {
    Stored(Credential),
    Refreshed(Credential),
    Consented(Credential),
}

impl Authorization {
    pub fn credential(&self) -> &Credential {
        match self {
            Self::Stored(c) | Self::Refreshed(c) | Self::Consented(c) => c,
        }
    }

    pub fn into_credential(self) -> Credential {
        match self {
            Self::Stored(c) | Self::Refreshed(c) | Self::Consented(c) => c,
        }
    }
}

/// Make sure an account is connected; after a fresh consent, offer to
/// schedule the daily agenda.
pub async fn run(ctx: &SessionContext) -> Result<FlowOutcome> {
    match authorize(ctx).await {
        Ok(Authorization::Consented(_)) => schedule::run(ctx).await,
        Ok(_) => Ok(FlowOutcome::Completed),
        Err(e) => conclude(ctx, Err(e), &NOTICES).await,
    }
}

/// Return a usable credential, running consent if there is none.
///
/// Clears the first-boot flag once an account is connected.
pub async fn authorize(ctx: &SessionContext) -> Result<Authorization> {
    ctx.set_state(SessionState::OAuth(OAuthStep::Checking));
    let authorization = match ctx.credentials.load() {
        Some(stored) if !stored.is_expired(unix_now()) => {
            debug!("stored credential is fresh");
            Authorization::Stored(stored)
        },
        Some(stored) if stored.can_refresh() => match refresh(ctx, &stored).await {
            Some(refreshed) => Authorization::Refreshed(refreshed),
            None => Authorization::Consented(consent(ctx).await?),
        },
        _ => Authorization::Consented(consent(ctx).await?),
    };

    if ctx.load_preferences()?.first_boot {
        ctx.update_preferences(|p| p.first_boot = false)?;
        info!("first boot complete");
    }
    Ok(authorization)
}

async fn refresh(ctx: &SessionContext, stored: &Credential) -> Option<Credential> {
    ctx.set_state(SessionState::OAuth(OAuthStep::Refreshing));
    let refreshed = match ctx.auth.refresh(stored).await {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "token refresh failed, asking for consent");
            return None;
        },
    };
    if let Err(e) = ctx.credentials.save(&refreshed) {
        warn!(error = %e, "failed to persist refreshed credential");
    }
    info!("credential refreshed");
    Some(refreshed)
}

async fn consent(ctx: &SessionContext) -> Result<Credential> {
    ctx.queue.clear();
    ctx.set_state(SessionState::OAuth(OAuthStep::AwaitingConsent));
    let returning = ctx.load_preferences()?.given_name.is_some();
    let request = ctx.auth.start()?;

    let mut server = CallbackServer::bind(ctx.settings.callback_port).await?;
    let tunnel = match ctx.tunnel.open(server.local_addr().port()).await {
        Ok(tunnel) => tunnel,
        Err(e) => {
            server.shutdown().await;
            return Err(e.into());
        },
    };
    server.set_consent_url(request.url.clone(), Some(request.state.clone()));

    let waiting = async move {
        let code = wait_for_code(ctx, &mut server).await;
        server.shutdown().await;
        tunnel.close().await;
        code
    };
    let (narrated, code) = tokio::join!(narrate(ctx, returning), waiting);
    narrated?;
    let code = code?;

    ctx.set_state(SessionState::OAuth(OAuthStep::Exchanging));
    let credential = ctx.auth.exchange(&code, &request.pkce.verifier).await?;
    ctx.credentials.save(&credential)?;
    info!("account connected");

    match ctx.auth.fetch_profile(&credential).await {
        Ok(profile) => {
            ctx.update_preferences(|p| {
                p.given_name = profile.given_name;
                p.family_name = profile.family_name;
            })?;
        },
        Err(e) => warn!(error = %e, "could not fetch profile name"),
    }

    ctx.say(messages::ACCOUNT_CONNECTED).await?;
    ctx.say(messages::KEYS_REMINDER).await?;
    Ok(credential)
}

async fn narrate(ctx: &SessionContext, returning: bool) -> Result<()> {
    let public_url = &ctx.settings.public_url;
    if returning {
        ctx.say(&messages::reconsent(public_url)).await
    } else {
        ctx.say(&messages::first_consent(public_url)).await?;
        ctx.say(messages::UNVERIFIED_APP_NOTE).await
    }
}

/// Wait for the provider callback, nudging the user each time the budget
/// runs out and starting a new one.
///
/// Typed text is ignored here. Control bytes still end the wait.
async fn wait_for_code(ctx: &SessionContext, server: &mut CallbackServer) -> Result<String> {
    let budget = ctx.settings.consent_budget;
    let mut deadline = Deadline::after(budget);
    loop {
        tokio::select! {
            code = server.wait_for_code(deadline.remaining()) => match code? {
                Some(code) => return Ok(code),
                None => {
                    ctx.say(messages::CONSENT_TIMED_OUT).await?;
                    deadline = Deadline::after(budget);
                },
            },
            frame = ctx.queue.recv() => match frame.control_byte() {
                Some(ControlByte::Cancel) => return Err(Interrupt::Cancelled.into()),
                Some(other) => return Err(Interrupt::Preempted(other).into()),
                None => debug!("ignoring typed text while waiting for consent"),
            },
        }
    }
}
