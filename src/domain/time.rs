use crate::domain::models::Task;
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// A task carried a time field that cannot be mapped to an instant. Raised
/// eagerly so a malformed task is skipped instead of corrupting a schedule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidTime {
    #[error("invalid start time '{0}': expected HH:MM")]
    StartTime(String),
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    Date(String),
    #[error("duration_minutes must be > 0")]
    ZeroDuration,
    #[error("local time {date} {time} does not exist in the configured timezone")]
    Nonexistent { date: String, time: String },
}

/// Instant at which the task is scheduled to start.
///
/// The task's date + "HH:MM" is wall-clock time in `zone` — the one canonical
/// interpretation used everywhere in this crate. A DST-ambiguous local time
/// resolves to the earlier instant; a DST-nonexistent one is an error.
pub fn absolute_start(task: &Task, zone: Tz) -> Result<DateTime<Utc>, InvalidTime> {
    let date = NaiveDate::parse_from_str(&task.date, "%Y-%m-%d")
        .map_err(|_| InvalidTime::Date(task.date.clone()))?;
    let time = parse_hhmm(&task.start_time)
        .ok_or_else(|| InvalidTime::StartTime(task.start_time.clone()))?;

    match zone.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(instant) => Ok(instant.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(InvalidTime::Nonexistent {
            date: task.date.clone(),
            time: task.start_time.clone(),
        }),
    }
}

/// Instant at which the task is scheduled to end: start + duration.
pub fn absolute_end(task: &Task, zone: Tz) -> Result<DateTime<Utc>, InvalidTime> {
    if task.duration_minutes == 0 {
        return Err(InvalidTime::ZeroDuration);
    }
    Ok(absolute_start(task, zone)? + Duration::minutes(i64::from(task.duration_minutes)))
}

pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// "MM:SS" display form of a second count.
pub fn format_seconds(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
