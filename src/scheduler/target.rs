//! Target-time parsing: a stored `{date, time, millis}` triple resolved to an
//! absolute instant.
//!
//! The triple is wall-clock local time, the way the user typed it into the
//! configuration surface. Resolution to UTC happens exactly once, here; the
//! rest of the system only ever compares `DateTime<Utc>` values.

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule has no date")]
    MissingDate,
    #[error("schedule has no time")]
    MissingTime,
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    BadDate(String),
    #[error("invalid time '{0}': expected HH:MM, HH:MM:SS or HH:MM:SS.fff")]
    BadTime(String),
    #[error("fractional seconds out of range: {0}ms")]
    BadMillis(u32),
    #[error("local instant {0} does not exist (skipped by a DST transition)")]
    NonexistentInstant(String),
}

/// Stored form of a target schedule, per course key. A missing date or time
/// makes the schedule inert: it resolves to an error and never fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSchedule {
    pub date: String,
    pub time: String,
    /// Explicit sub-second precision. Overrides any fractional part carried
    /// in the time string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub millis: Option<u32>,
}

impl TargetSchedule {
    /// Resolve to the absolute instant this schedule fires at.
    pub fn resolve(&self) -> Result<DateTime<Utc>, ScheduleError> {
        resolve_local(&self.date, &self.time, self.millis).map(|dt| dt.with_timezone(&Utc))
    }
}

/// Compose date, time-of-day and optional milliseconds into a local instant.
/// Pure and deterministic; never panics on malformed input.
pub fn resolve_local(
    date: &str,
    time: &str,
    millis: Option<u32>,
) -> Result<DateTime<Local>, ScheduleError> {
    let date = date.trim();
    let time = time.trim();
    if date.is_empty() {
        return Err(ScheduleError::MissingDate);
    }
    if time.is_empty() {
        return Err(ScheduleError::MissingTime);
    }

    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ScheduleError::BadDate(date.to_string()))?;
    let mut tod = parse_time_of_day(time)?;

    if let Some(ms) = millis {
        if ms > 999 {
            return Err(ScheduleError::BadMillis(ms));
        }
        // Explicit field wins over a fractional part in the time string.
        tod = tod
            .with_nanosecond(ms * 1_000_000)
            .ok_or(ScheduleError::BadMillis(ms))?;
    }

    let naive = NaiveDateTime::new(day, tod);
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        // A fall-back transition repeats the wall-clock hour; take the first
        // occurrence so the timer never fires later than the user expects.
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(ScheduleError::NonexistentInstant(naive.to_string())),
    }
}

/// Accepts HH:MM, HH:MM:SS and HH:MM:SS.fff. Missing seconds default to 0.
fn parse_time_of_day(s: &str) -> Result<NaiveTime, ScheduleError> {
    // %.f also matches the no-fraction case, so two formats cover all three
    // accepted granularities.
    for fmt in ["%H:%M:%S%.f", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Ok(t);
        }
    }
    Err(ScheduleError::BadTime(s.to_string()))
}
