//! Error plumbing shared by the underwood crates.

pub mod error;

pub use error::FromMessage;
