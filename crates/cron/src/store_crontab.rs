//! [`ScheduleStore`] over the system crontab.
//!
//! The table is read with `crontab -l` and written back whole with
//! `crontab -`. Lines not carrying our tag are preserved verbatim.

use std::process::Stdio;

use {
    async_trait::async_trait,
    chrono::NaiveTime,
    tokio::{io::AsyncWriteExt, process::Command},
    tracing::{debug, info},
};

use crate::{Error, Result, error::Context, store::ScheduleStore, types::ScheduledJob};

/// The tagged job in `crontab`, if any.
pub fn find_job(crontab: &str, tag: &str) -> Option<ScheduledJob> {
    crontab
        .lines()
        .filter_map(ScheduledJob::from_crontab_line)
        .find(|job| job.tag == tag)
}

/// `crontab` with the tagged entry replaced by `job`, or `job` appended.
///
/// Stray duplicates of the tag are dropped so exactly one entry remains.
pub fn upsert_line(crontab: &str, job: &ScheduledJob) -> String {
    let mut out = Vec::new();
    let mut placed = false;
    for line in crontab.lines() {
        if is_tagged(line, &job.tag) {
            if !placed {
                out.push(job.to_string());
                placed = true;
            }
            continue;
        }
        out.push(line.to_string());
    }
    if !placed {
        out.push(job.to_string());
    }
    join_lines(out)
}

/// `crontab` without any entry carrying `tag`, and whether one was removed.
pub fn remove_job(crontab: &str, tag: &str) -> (String, bool) {
    let mut removed = false;
    let kept: Vec<String> = crontab
        .lines()
        .filter(|line| {
            let tagged = is_tagged(line, tag);
            removed |= tagged;
            !tagged
        })
        .map(ToString::to_string)
        .collect();
    (join_lines(kept), removed)
}

fn is_tagged(line: &str, tag: &str) -> bool {
    ScheduledJob::from_crontab_line(line).is_some_and(|job| job.tag == tag)
}

fn join_lines(lines: Vec<String>) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

pub struct CrontabStore {
    tag: String,
    command: String,
    user: Option<String>,
}

impl CrontabStore {
    pub fn new(tag: impl Into<String>, command: impl Into<String>, user: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            command: command.into(),
            user,
        }
    }

    fn user_args(&self) -> Vec<&str> {
        match &self.user {
            Some(user) => vec!["-u", user.as_str()],
            None => Vec::new(),
        }
    }

    async fn read(&self) -> Result<String> {
        let mut args = self.user_args();
        args.push("-l");
        let output = Command::new("crontab")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .context("failed to run crontab -l")?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("no crontab") {
            debug!(user = ?self.user, "no crontab yet");
            return Ok(String::new());
        }
        Err(Error::command("crontab -l", stderr.trim()))
    }

    async fn write(&self, contents: &str) -> Result<()> {
        let mut args = self.user_args();
        args.push("-");
        let mut child = Command::new("crontab")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to run crontab -")?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(contents.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::command("crontab -", stderr.trim()));
        }
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for CrontabStore {
    async fn find(&self) -> Result<Option<ScheduledJob>> {
        Ok(find_job(&self.read().await?, &self.tag))
    }

    async fn upsert(&self, time: NaiveTime) -> Result<ScheduledJob> {
        let job = ScheduledJob::new(time, self.command.clone(), self.tag.clone());
        let current = self.read().await?;
        self.write(&upsert_line(&current, &job)).await?;
        info!(time = %job.time.format("%H:%M"), tag = %job.tag, "agenda job scheduled");
        Ok(job)
    }

    async fn delete(&self) -> Result<bool> {
        let current = self.read().await?;
        let (updated, removed) = remove_job(&current, &self.tag);
        if removed {
            self.write(&updated).await?;
            info!(tag = %self.tag, "agenda job removed");
        }
        Ok(removed)
    }
}
