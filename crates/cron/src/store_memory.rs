//! In-memory store for testing.

use std::sync::Mutex;

use {async_trait::async_trait, chrono::NaiveTime};

use crate::{
    Result,
    store::ScheduleStore,
    store_crontab::{find_job, remove_job, upsert_line},
    types::ScheduledJob,
};

/// Keeps a crontab-formatted table in memory and edits it the same way
/// [`CrontabStore`](crate::CrontabStore) edits the real one.
pub struct InMemoryStore {
    tag: String,
    command: String,
    table: Mutex<String>,
}

impl InMemoryStore {
    pub fn new(tag: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            command: command.into(),
            table: Mutex::new(String::new()),
        }
    }

    /// Current table text.
    pub fn contents(&self) -> String {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new("generate_agenda_job", "underwood agenda")
    }
}

#[async_trait]
impl ScheduleStore for InMemoryStore {
    async fn find(&self) -> Result<Option<ScheduledJob>> {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        Ok(find_job(&table, &self.tag))
    }

    async fn upsert(&self, time: NaiveTime) -> Result<ScheduledJob> {
        let job = ScheduledJob::new(time, self.command.clone(), self.tag.clone());
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        *table = upsert_line(&table, &job);
        Ok(job)
    }

    async fn delete(&self) -> Result<bool> {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let (updated, removed) = remove_job(&table, &self.tag);
        *table = updated;
        Ok(removed)
    }
}
