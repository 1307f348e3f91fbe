use crate::domain::models::{NotificationRecord, Task};
use crate::domain::time::{InvalidTime, absolute_end, absolute_start};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const PRE_WARNING_MINUTES: i64 = 5;
pub const NUDGE_DELAY_MINUTES: i64 = 3;

const PRE_WARNING_BODY: &str = "Gjør deg klar for neste oppgave!";
const START_BODY: &str = "Det er tid for å starte!";
const NUDGE_BODY: &str = "Husk å markere oppgaven som ferdig!";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// 5 minutes before the task starts.
    PreWarning,
    /// At the scheduled start.
    Start,
    /// 3 minutes after the scheduled end, asking for completion confirmation.
    Nudge,
}

impl ReminderKind {
    /// Stable id suffix; `<taskId>-<suffix>` is the dedup key for relayed
    /// notifications and must not change between releases.
    pub fn suffix(self) -> &'static str {
        match self {
            ReminderKind::PreWarning => "pre",
            ReminderKind::Start => "start",
            ReminderKind::Nudge => "nudge",
        }
    }
}

/// One computed reminder for a task: fire instant plus the notification text.
/// The emoji is kept separate; delivery composes the display title as
/// "<emoji> <title>".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderCandidate {
    pub task_id: String,
    pub kind: ReminderKind,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub emoji: String,
    pub tag: String,
}

/// A task whose time fields could not be interpreted; reported so one bad task
/// never aborts scheduling for the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTask {
    pub task_id: String,
    pub error: InvalidTime,
}

/// All three reminder candidates for one task, regardless of the clock. The
/// caller filters against "now" (armed locally or built into a schedule).
pub fn reminder_candidates(task: &Task, zone: Tz) -> Result<Vec<ReminderCandidate>, InvalidTime> {
    let start = absolute_start(task, zone)?;
    let end = absolute_end(task, zone)?;

    let candidate = |kind: ReminderKind, fire_at: DateTime<Utc>, title: String, body: &str| {
        ReminderCandidate {
            task_id: task.id.clone(),
            kind,
            fire_at,
            title,
            body: body.to_string(),
            emoji: task.emoji.clone(),
            tag: format!("task-{}-{}", task.id, kind.suffix()),
        }
    };

    Ok(vec![
        candidate(
            ReminderKind::PreWarning,
            start - Duration::minutes(PRE_WARNING_MINUTES),
            format!("Om 5 minutter: {}", task.title),
            PRE_WARNING_BODY,
        ),
        candidate(ReminderKind::Start, start, task.title.clone(), START_BODY),
        candidate(
            ReminderKind::Nudge,
            end + Duration::minutes(NUDGE_DELAY_MINUTES),
            format!("Har du fullført \"{}\"?", task.title),
            NUDGE_BODY,
        ),
    ])
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleBuild {
    pub records: Vec<NotificationRecord>,
    pub skipped: Vec<SkippedTask>,
}

/// Serializes a day's plan into the relayed notification schedule: the same
/// three-offset rule as local arming, minus anything not strictly in the
/// future at build time. Ids are deterministic per (task, kind) so rebuilding
/// an unchanged plan produces identical records.
pub fn build_notification_schedule(tasks: &[Task], zone: Tz, now: DateTime<Utc>) -> ScheduleBuild {
    let mut build = ScheduleBuild::default();

    for task in tasks {
        if task.completed {
            continue;
        }
        let candidates = match reminder_candidates(task, zone) {
            Ok(candidates) => candidates,
            Err(error) => {
                build.skipped.push(SkippedTask {
                    task_id: task.id.clone(),
                    error,
                });
                continue;
            }
        };
        for candidate in candidates {
            if candidate.fire_at <= now {
                continue;
            }
            build.records.push(NotificationRecord {
                id: format!("{}-{}", task.id, candidate.kind.suffix()),
                time: candidate.fire_at,
                title: candidate.title,
                body: candidate.body,
                emoji: candidate.emoji,
                tag: candidate.tag,
            });
        }
    }

    build
}

/// The task whose window contains `now`, or failing that the next upcoming
/// one. Only meaningful for today's plan; any other date yields None.
pub fn current_or_next_task<'a>(
    tasks: &'a [Task],
    date: &str,
    zone: Tz,
    now: DateTime<Utc>,
) -> Option<&'a Task> {
    if now.with_timezone(&zone).date_naive().format("%Y-%m-%d").to_string() != date {
        return None;
    }

    let mut next: Option<(&Task, DateTime<Utc>)> = None;
    for task in tasks {
        if task.completed {
            continue;
        }
        let Ok(start) = absolute_start(task, zone) else {
            continue;
        };
        let Ok(end) = absolute_end(task, zone) else {
            continue;
        };
        if start <= now && now < end {
            return Some(task);
        }
        if start > now && next.is_none_or(|(_, best)| start < best) {
            next = Some((task, start));
        }
    }
    next.map(|(task, _)| task)
}
