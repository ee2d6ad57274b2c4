//! The typewriter as a character device: raw input frames in, paced text out.
//!
//! Input arrives as newline-terminated frames read by a background listener
//! and queued for the single active consumer. Output is word-wrapped,
//! flattened to plain ASCII and typed one character at a time.

pub mod channel;
pub mod error;
pub mod format;
pub mod frame;
pub mod queue;
pub mod serial;

pub use {
    channel::{DeviceChannel, DeviceLink, MemoryLink, Pacing},
    error::{Error, Result},
    format::LINE_WIDTH,
    frame::{ControlByte, InputFrame},
    queue::{FrameSender, InputQueue, TimedOut},
};
