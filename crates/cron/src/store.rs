//! Persistence trait for the tagged agenda job.

use {async_trait::async_trait, chrono::NaiveTime};

use crate::{Result, types::ScheduledJob};

/// Backend holding at most one job with the store's tag.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn find(&self) -> Result<Option<ScheduledJob>>;

    /// Move the existing job to `time`, or create it.
    async fn upsert(&self, time: NaiveTime) -> Result<ScheduledJob>;

    /// Remove the job. Returns whether one existed.
    async fn delete(&self) -> Result<bool>;
}
