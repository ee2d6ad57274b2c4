use {thiserror::Error, underwood_device::ControlByte};

/// Why a wait on the input queue ended without an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupt {
    #[error("no answer before the deadline")]
    TimedOut,
    #[error("cancelled by the user")]
    Cancelled,
    #[error("pre-empted by {0}")]
    Preempted(ControlByte),
}

/// How a flow handed control back to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    Completed,
    Cancelled,
    TimedOut,
    /// A control byte arrived mid-flow; the dispatcher acts on it next.
    Preempted(ControlByte),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Interrupted(#[from] Interrupt),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Device(#[from] underwood_device::Error),

    #[error(transparent)]
    Config(#[from] underwood_config::Error),

    #[error(transparent)]
    OAuth(#[from] underwood_oauth::Error),

    #[error(transparent)]
    Network(#[from] underwood_network::Error),

    #[error(transparent)]
    Schedule(#[from] underwood_cron::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl underwood_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

underwood_common::impl_context!();
