//! Settings menu opened by the RELOC key.

use tracing::debug;

use crate::{
    FlowOutcome, Result, agenda,
    context::{Deadline, SessionContext},
    flows::{Notices, conclude, reset, schedule, wifi},
    messages,
    state::SessionState,
};

const NOTICES: Notices = Notices {
    flow: "menu",
    timed_out: messages::MENU_TIMED_OUT,
    cancelled: messages::MENU_CANCELED,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Agenda,
    Schedule,
    Wifi,
    About,
    Reset,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().trim_end_matches('.') {
            "1" => Some(Self::Agenda),
            "2" => Some(Self::Schedule),
            "3" => Some(Self::Wifi),
            "4" => Some(Self::About),
            "5" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// Show the options and run the chosen one. Flows started from here report
/// their own interruptions.
pub async fn run(ctx: &SessionContext) -> Result<FlowOutcome> {
    let result = choose(ctx).await;
    conclude(ctx, result, &NOTICES).await
}

async fn choose(ctx: &SessionContext) -> Result<FlowOutcome> {
    ctx.queue.clear();
    ctx.set_state(SessionState::Menu);
    ctx.say(messages::MENU).await?;

    let choice = loop {
        let answer = ctx
            .answer(Deadline::after(ctx.settings.menu_timeout))
            .await?;
        match MenuChoice::parse(&answer) {
            Some(choice) => break choice,
            None => {
                debug!(answer = %answer, "unrecognized menu choice");
                ctx.say(messages::MENU_INVALID).await?;
            },
        }
    };

    debug!(?choice, "menu choice");
    match choice {
        MenuChoice::Agenda => agenda::generate(ctx).await,
        MenuChoice::Schedule => schedule::run(ctx).await,
        MenuChoice::Wifi => wifi::run(ctx).await,
        MenuChoice::About => {
            ctx.say(messages::ABOUT).await?;
            Ok(FlowOutcome::Completed)
        },
        MenuChoice::Reset => reset::run(ctx).await,
    }
}
