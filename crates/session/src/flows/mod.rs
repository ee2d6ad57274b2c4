//! Conversation flows. Each owns the input queue while it runs and hands
//! back a [`FlowOutcome`].

pub mod oauth;
pub mod reset;
pub mod schedule;
pub mod wifi;

use tracing::info;

use crate::{
    Error, FlowOutcome, Interrupt, Result,
    context::SessionContext,
};

/// What to print when a flow is interrupted.
pub(crate) struct Notices {
    pub flow: &'static str,
    pub timed_out: &'static str,
    pub cancelled: &'static str,
}

/// Turn an interrupted flow into an outcome, telling the user why it ended.
///
/// Pre-emption is silent: the dispatcher acts on the control byte next.
pub(crate) async fn conclude(
    ctx: &SessionContext,
    result: Result<FlowOutcome>,
    notices: &Notices,
) -> Result<FlowOutcome> {
    let interrupt = match result {
        Err(Error::Interrupted(interrupt)) => interrupt,
        other => return other,
    };
    info!(flow = notices.flow, %interrupt, "flow interrupted");
    match interrupt {
        Interrupt::TimedOut => {
            ctx.say(notices.timed_out).await?;
            Ok(FlowOutcome::TimedOut)
        },
        Interrupt::Cancelled => {
            ctx.say(notices.cancelled).await?;
            Ok(FlowOutcome::Cancelled)
        },
        Interrupt::Preempted(control) => Ok(FlowOutcome::Preempted(control)),
    }
}
