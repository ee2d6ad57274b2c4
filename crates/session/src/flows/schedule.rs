//! Set, move or delete the daily agenda job.
//!
//! One deadline covers the whole conversation: the choice prompt and every
//! time-entry attempt draw down the same budget.

use {tracing::debug, underwood_cron::format_12h};

use crate::{
    FlowOutcome, Result,
    context::{Deadline, SessionContext},
    flows::{Notices, conclude},
    messages,
    state::{ScheduleStep, SessionState},
};

const NOTICES: Notices = Notices {
    flow: "schedule",
    timed_out: messages::SCHEDULE_TIMED_OUT,
    cancelled: messages::SCHEDULE_CANCELED,
};

pub async fn run(ctx: &SessionContext) -> Result<FlowOutcome> {
    let result = converse(ctx).await;
    conclude(ctx, result, &NOTICES).await
}

async fn converse(ctx: &SessionContext) -> Result<FlowOutcome> {
    ctx.queue.clear();
    ctx.set_state(SessionState::Schedule(ScheduleStep::Choosing));

    let existing = ctx.schedule.find().await?;
    match &existing {
        Some(job) => {
            ctx.say(&messages::current_schedule(&format_12h(job.time)))
                .await?;
            ctx.say(messages::SCHEDULE_CHOICES).await?;
        },
        None => ctx.say(messages::SCHEDULE_OFFER).await?,
    }

    let deadline = Deadline::after(ctx.settings.schedule_timeout);
    loop {
        let choice = ctx.answer(deadline).await?.to_lowercase();
        match (choice.as_str(), existing.is_some()) {
            ("delete", true) => {
                ctx.schedule.delete().await?;
                ctx.say(messages::SCHEDULE_DELETED).await?;
                return Ok(FlowOutcome::Completed);
            },
            ("change", true) | ("set", _) => break,
            _ => {
                debug!(choice = %choice, "unrecognized schedule choice");
                ctx.say(messages::SCHEDULE_INVALID).await?;
            },
        }
    }

    enter_time(ctx, deadline).await
}

async fn enter_time(ctx: &SessionContext, deadline: Deadline) -> Result<FlowOutcome> {
    ctx.set_state(SessionState::Schedule(ScheduleStep::EnteringTime));
    loop {
        ctx.say(messages::ASK_TIME).await?;
        let answer = ctx.answer(deadline).await?;
        let Some(time) = ctx.time_parser.parse(&answer) else {
            debug!(input = %answer, "time not understood");
            ctx.say(messages::TIME_INVALID).await?;
            continue;
        };

        ctx.say(messages::SETTING_UP_SCHEDULE).await?;
        let job = ctx.schedule.upsert(time).await?;
        ctx.say(&messages::scheduled(&format_12h(job.time)))
            .await?;
        return Ok(FlowOutcome::Completed);
    }
}
