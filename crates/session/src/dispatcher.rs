//! The processor loop: reads control frames at idle and runs one flow at a
//! time.
//!
//! Every flow runs on its own task, so a panic inside one is reported like
//! any other failure and the processor returns to idle.

use std::{any::Any, future::Future, sync::Arc};

use {
    tokio::task::JoinHandle,
    tracing::{debug, error, info, warn},
    underwood_device::{ControlByte, InputFrame},
};

use crate::{
    Error, FlowOutcome, Result, agenda,
    context::SessionContext,
    flows::wifi,
    menu, messages,
    state::SessionState,
};

pub struct Dispatcher {
    ctx: Arc<SessionContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Greet when online, otherwise go straight to Wi-Fi setup.
    pub async fn startup(&self) {
        let result = isolated(Arc::clone(&self.ctx), |ctx| async move {
            if ctx.network.is_online().await {
                info!("online at startup");
                ctx.say(messages::ALL_SET).await.map(|()| FlowOutcome::Completed)
            } else {
                info!("offline at startup, starting wifi setup");
                wifi::run(&ctx).await
            }
        })
        .await;
        if let Some(next) = self.settle(result).await {
            self.dispatch_chain(next).await;
        }
    }

    /// Consume the queue forever.
    pub async fn run(&self) {
        info!("session dispatcher running");
        loop {
            let frame = self.ctx.queue.recv().await;
            self.handle(frame).await;
        }
    }

    /// Act on one frame received at idle. Text and cancel frames are ignored.
    pub async fn handle(&self, frame: InputFrame) {
        match frame.control_byte() {
            Some(ControlByte::Cancel) => debug!("cancel at idle, nothing to cancel"),
            Some(control) => self.dispatch_chain(control).await,
            None => debug!(len = frame.as_bytes().len(), "ignoring text at idle"),
        }
    }

    /// Run the action for `control`, then for any control byte that
    /// pre-empted it, until a flow ends without one.
    async fn dispatch_chain(&self, control: ControlByte) {
        let mut next = Some(control);
        while let Some(control) = next {
            info!(%control, "dispatching");
            let result = isolated(Arc::clone(&self.ctx), move |ctx| async move {
                dispatch(&ctx, control).await
            })
            .await;
            next = self.settle(result).await;
        }
    }

    /// Return to idle, logging failures. Yields the pre-empting control
    /// byte, if any.
    async fn settle(&self, result: Result<FlowOutcome>) -> Option<ControlByte> {
        self.ctx.set_state(SessionState::Idle);
        match result {
            Ok(FlowOutcome::Preempted(control)) => Some(control),
            Ok(outcome) => {
                debug!(?outcome, "flow finished");
                None
            },
            Err(e) => {
                error!(error = %e, "flow failed");
                if let Err(e) = self.ctx.say(messages::SOMETHING_WENT_WRONG).await {
                    warn!(error = %e, "could not report failure on device");
                }
                None
            },
        }
    }
}

async fn dispatch(ctx: &SessionContext, control: ControlByte) -> Result<FlowOutcome> {
    match control {
        ControlByte::OpenMenu => menu::run(ctx).await,
        ControlByte::GenerateAgenda => agenda::generate(ctx).await,
        ControlByte::ResetNetwork => {
            ctx.set_state(SessionState::NetworkReset);
            ctx.say(messages::RESETTING_WIFI).await?;
            ctx.network.reset_to_factory().await?;
            ctx.say(messages::WIFI_RESET_DONE).await?;
            Ok(FlowOutcome::Completed)
        },
        ControlByte::Cancel => Ok(FlowOutcome::Cancelled),
    }
}

/// Aborts the flow task when the waiting side goes away first.
struct FlowTask(JoinHandle<Result<FlowOutcome>>);

impl Drop for FlowTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run a flow on its own task and turn a panic into an error.
async fn isolated<F, Fut>(ctx: Arc<SessionContext>, flow: F) -> Result<FlowOutcome>
where
    F: FnOnce(Arc<SessionContext>) -> Fut,
    Fut: Future<Output = Result<FlowOutcome>> + Send + 'static,
{
    let mut task = FlowTask(tokio::spawn(flow(ctx)));
    match (&mut task.0).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(Error::message(format!(
            "flow panicked: {}",
            panic_message(e.into_panic().as_ref())
        ))),
        Err(e) => Err(Error::message(format!("flow task ended early: {e}"))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}
