//! Time-of-day parsing for free text typed on the device.
//!
//! Accepts clock times (`4:35 pm`, `4:35pm`, `16:35`, `1635`, `4 35 pm`),
//! bare hours (`4 pm`, `7 a.m.`), `noon` and `midnight`, `half past` and
//! `quarter past/to` phrases, an optional leading `at`, and a trailing
//! day-period (`in the morning`, `in the afternoon`, `in the evening`,
//! `at night`).

use chrono::{NaiveTime, TimeDelta};

/// Turns free text into a time of day.
pub trait TimeParser: Send + Sync {
    fn parse(&self, input: &str) -> Option<NaiveTime>;
}

/// English [`TimeParser`] for the phrasings listed in the module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalTimeParser;

impl TimeParser for NaturalTimeParser {
    fn parse(&self, input: &str) -> Option<NaiveTime> {
        parse_time_of_day(input)
    }
}

/// `4:35 PM` style, as read back to the user.
pub fn format_12h(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Morning,
    Afternoon,
    Night,
}

const PERIODS: &[(&str, Period)] = &[
    ("in the morning", Period::Morning),
    ("this morning", Period::Morning),
    ("in the afternoon", Period::Afternoon),
    ("this afternoon", Period::Afternoon),
    ("in the evening", Period::Afternoon),
    ("this evening", Period::Afternoon),
    ("tonight", Period::Night),
    ("at night", Period::Night),
];

pub fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    let mut text = input.trim().to_ascii_lowercase();
    for (from, to) in [("a.m.", "am"), ("p.m.", "pm"), ("a.m", "am"), ("p.m", "pm")] {
        text = text.replace(from, to);
    }
    text = text.replace("o'clock", " ");
    let mut text = text.trim_end_matches(['.', '!', '?', ' ']).trim();
    if let Some(rest) = text.strip_prefix("at ") {
        text = rest.trim_start();
    }

    let mut period = None;
    for (suffix, p) in PERIODS {
        if let Some(rest) = text.strip_suffix(suffix) {
            text = rest.trim_end();
            period = Some(*p);
            break;
        }
    }

    match text {
        "noon" | "midday" | "12 noon" => return NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" | "12 midnight" => return NaiveTime::from_hms_opt(0, 0, 0),
        _ => {},
    }

    let relative = [
        ("half past ", TimeDelta::minutes(30)),
        ("quarter past ", TimeDelta::minutes(15)),
        ("quarter to ", TimeDelta::minutes(-15)),
    ];
    for (prefix, offset) in relative {
        if let Some(rest) = text.strip_prefix(prefix) {
            let base = clock(rest.trim(), period)?;
            return Some(base + offset);
        }
    }

    clock(text, period)
}

/// Parse `H`, `H:MM`, `H.MM`, `H MM` or `HMM`/`HHMM`, with optional am/pm.
fn clock(text: &str, period: Option<Period>) -> Option<NaiveTime> {
    let (digits, meridiem) = split_meridiem(text);
    let digits = digits.trim();
    if digits.is_empty() {
        return None;
    }

    let parts: Vec<&str> = digits
        .split([':', '.', ' '])
        .filter(|p| !p.is_empty())
        .collect();
    let (hour, minute) = match parts.as_slice() {
        [compact] if compact.len() >= 3 => {
            let n = number(compact)?;
            (n / 100, n % 100)
        },
        [hour] => (number(hour)?, 0),
        [hour, minute] if minute.len() == 2 => (number(hour)?, number(minute)?),
        _ => return None,
    };
    if minute > 59 {
        return None;
    }

    let hour = match meridiem {
        Some(m) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match m {
                Meridiem::Am => hour % 12,
                Meridiem::Pm => hour % 12 + 12,
            }
        },
        None => apply_period(hour, period)?,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn split_meridiem(text: &str) -> (&str, Option<Meridiem>) {
    for (suffix, meridiem) in [("am", Meridiem::Am), ("pm", Meridiem::Pm)] {
        if let Some(rest) = text.strip_suffix(suffix)
            && rest.ends_with(|c: char| c.is_ascii_digit() || c == ' ')
        {
            return (rest, Some(meridiem));
        }
    }
    (text, None)
}

fn apply_period(hour: u32, period: Option<Period>) -> Option<u32> {
    if hour > 23 {
        return None;
    }
    let Some(period) = period else {
        return Some(hour);
    };
    if hour > 12 {
        return (period != Period::Morning).then_some(hour);
    }
    Some(match period {
        Period::Morning => hour % 12,
        Period::Afternoon => hour % 12 + 12,
        Period::Night => match hour {
            12 => 0,
            1..=4 => hour,
            _ => hour + 12,
        },
    })
}

fn number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
