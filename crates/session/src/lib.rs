//! The interactive session engine.
//!
//! One [`Dispatcher`] consumes the device's [`InputQueue`](underwood_device::InputQueue)
//! and runs at most one conversation flow at a time:
//! settings menu, Wi-Fi provisioning, account authorization, agenda
//! scheduling, or system reset. Every wait on the queue carries a deadline,
//! and a control byte arriving at a wait point interrupts the flow.

pub mod agenda;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod flows;
pub mod menu;
mod messages;
pub mod state;

pub use {
    agenda::{AgendaComposer, AgendaRequest, CommandComposer},
    context::{Collaborators, Deadline, SessionContext, Settings},
    dispatcher::Dispatcher,
    error::{Error, FlowOutcome, Interrupt, Result},
    state::{OAuthStep, ResetStep, ScheduleStep, SessionState, WifiStep},
};
