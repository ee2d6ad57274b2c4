use std::fmt;

use chrono::{NaiveTime, Timelike};

/// A daily job identified by a trailing `# <tag>` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub time: NaiveTime,
    pub command: String,
    pub tag: String,
}

impl ScheduledJob {
    pub fn new(time: NaiveTime, command: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            time,
            command: command.into(),
            tag: tag.into(),
        }
    }

    /// Parse a crontab line of the form `M H * * * <command> # <tag>`.
    ///
    /// Only daily entries are recognised; anything else returns `None`.
    pub fn from_crontab_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (entry, tag) = line.rsplit_once('#')?;
        let tag = tag.trim();
        let mut rest = entry.trim();
        let minute: u32 = next_field(&mut rest)?.parse().ok()?;
        let hour: u32 = next_field(&mut rest)?.parse().ok()?;
        for _ in 0..3 {
            if next_field(&mut rest)? != "*" {
                return None;
            }
        }
        let command = rest;
        if command.is_empty() || tag.is_empty() {
            return None;
        }
        let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
        Some(Self::new(time, command, tag))
    }
}

/// Split off one whitespace-delimited field, leaving `rest` at the next one.
fn next_field<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let end = rest.find(char::is_whitespace)?;
    let (field, tail) = rest.split_at(end);
    *rest = tail.trim_start();
    Some(field)
}

impl fmt::Display for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} * * * {} # {}",
            self.time.minute(),
            self.time.hour(),
            self.command,
            self.tag
        )
    }
}
