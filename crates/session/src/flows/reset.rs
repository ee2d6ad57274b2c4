//! Destructive reset: forget the account, the schedule, the preferences and
//! every Wi-Fi network but the factory one.

use tracing::{info, warn};

use crate::{
    FlowOutcome, Result,
    context::{Deadline, SessionContext},
    flows::{Notices, conclude},
    messages,
    state::{ResetStep, SessionState},
};

const NOTICES: Notices = Notices {
    flow: "reset",
    timed_out: messages::RESET_NOT_CONFIRMED,
    cancelled: messages::RESET_CANCELED,
};

pub async fn run(ctx: &SessionContext) -> Result<FlowOutcome> {
    let result = confirm_and_wipe(ctx).await;
    conclude(ctx, result, &NOTICES).await
}

async fn confirm_and_wipe(ctx: &SessionContext) -> Result<FlowOutcome> {
    ctx.queue.clear();
    ctx.set_state(SessionState::Reset(ResetStep::Confirming));
    ctx.say(messages::RESET_CONFIRM).await?;

    let answer = ctx
        .answer(Deadline::after(ctx.settings.reset_timeout))
        .await?;
    if !answer.eq_ignore_ascii_case("reset") {
        ctx.say(messages::RESET_NOT_CONFIRMED).await?;
        return Ok(FlowOutcome::Cancelled);
    }

    ctx.set_state(SessionState::Reset(ResetStep::Wiping));
    wipe(ctx).await?;
    ctx.say(messages::RESET_DONE).await?;
    Ok(FlowOutcome::Completed)
}

/// Every step runs even if an earlier one fails, except that local account
/// files must be gone before the network is touched.
async fn wipe(ctx: &SessionContext) -> Result<()> {
    match ctx.schedule.delete().await {
        Ok(removed) => info!(removed, "agenda schedule cleared"),
        Err(e) => warn!(error = %e, "failed to clear agenda schedule"),
    }

    ctx.preferences.reset()?;

    if let Some(credential) = ctx.credentials.load()
        && let Err(e) = ctx.auth.revoke(&credential).await
    {
        warn!(error = %e, "token revoke failed, deleting local credential anyway");
    }
    ctx.credentials.delete()?;

    if let Err(e) = ctx.network.reset_to_factory().await {
        warn!(error = %e, "failed to restore factory network");
    }
    info!("system reset complete");
    Ok(())
}
