//! The recurring agenda job and the time-of-day parser used to set it.
//!
//! At most one job carries the configured tag. It lives in the system
//! crontab ([`store_crontab::CrontabStore`]) or, for tests, in memory
//! ([`store_memory::InMemoryStore`]).

pub mod error;
pub mod parse;
pub mod store;
pub mod store_crontab;
pub mod store_memory;
pub mod types;

pub use {
    error::{Error, Result},
    parse::{NaturalTimeParser, TimeParser, format_12h},
    store::ScheduleStore,
    store_crontab::CrontabStore,
    store_memory::InMemoryStore,
    types::ScheduledJob,
};
