use crate::domain::models::Task;
use crate::domain::schedule::{ReminderKind, SkippedTask, reminder_candidates};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinSet;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Short buzz accompanying a local notification, for sinks that support it.
pub const VIBRATION_PATTERN_MS: [u32; 3] = [100, 50, 100];

/// Composed OS notification, ready for the delivery boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNotification {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub icon: String,
}

/// Delivery boundary for locally fired reminders. The scheduler composes the
/// notification; the sink owns permission state and the actual OS call.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    fn permission_granted(&self) -> bool {
        true
    }

    async fn notify(&self, notification: LocalNotification);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedReminder {
    pub task_id: String,
    pub kind: ReminderKind,
    pub fire_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArmReport {
    pub armed: Vec<ArmedReminder>,
    pub skipped: Vec<SkippedTask>,
}

/// Arms the day's reminders as timed callbacks while the app is open. The
/// instance owns every armed callback: re-arming replaces the outstanding
/// batch, and dropping the scheduler (the view closing) cancels everything.
/// No process-wide state.
pub struct ReminderScheduler {
    zone: Tz,
    icon: String,
    sink: Arc<dyn ReminderSink>,
    now_provider: NowProvider,
    /// Bumped on every cancellation; callbacks from superseded batches check
    /// it before delivering, so a sleep that has already elapsed cannot fire
    /// into a new batch.
    generation: Arc<AtomicU64>,
    armed: JoinSet<()>,
}

impl ReminderScheduler {
    pub fn new(zone: Tz, icon: impl Into<String>, sink: Arc<dyn ReminderSink>) -> Self {
        Self {
            zone,
            icon: icon.into(),
            sink,
            now_provider: Arc::new(Utc::now),
            generation: Arc::new(AtomicU64::new(0)),
            armed: JoinSet::new(),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Replaces the armed batch with reminders for `tasks`. Candidates already
    /// in the past are discarded — no catch-up firing. Completed tasks get no
    /// reminders; malformed tasks are reported and skipped without aborting
    /// the rest.
    pub fn arm(&mut self, tasks: &[Task]) -> ArmReport {
        self.cancel_all();

        let mut report = ArmReport::default();
        if !self.sink.permission_granted() {
            return report;
        }

        let now = (self.now_provider)();
        let generation = self.generation.load(Ordering::SeqCst);

        for task in tasks {
            if task.completed {
                continue;
            }
            let candidates = match reminder_candidates(task, self.zone) {
                Ok(candidates) => candidates,
                Err(error) => {
                    tracing::warn!(task_id = %task.id, %error, "skipping unschedulable task");
                    report.skipped.push(SkippedTask {
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
                let delay = (candidate.fire_at - now)
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                let notification = LocalNotification {
                    title: format!("{} {}", candidate.emoji, candidate.title),
                    body: candidate.body.clone(),
                    tag: candidate.tag.clone(),
                    icon: self.icon.clone(),
                };
                let sink = Arc::clone(&self.sink);
                let generation_cell = Arc::clone(&self.generation);

                report.armed.push(ArmedReminder {
                    task_id: candidate.task_id.clone(),
                    kind: candidate.kind,
                    fire_at: candidate.fire_at,
                });
                self.armed.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if generation_cell.load(Ordering::SeqCst) != generation {
                        return;
                    }
                    sink.notify(notification).await;
                });
            }
        }

        tracing::debug!(
            armed = report.armed.len(),
            skipped = report.skipped.len(),
            "reminder batch armed"
        );
        report
    }

    /// Cancels every outstanding callback. Total: nothing armed before this
    /// call may fire afterwards.
    pub fn cancel_all(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        // Dropping the set aborts all tasks still parked in their sleeps.
        self.armed = JoinSet::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::test_support::sample_task;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug)]
    struct RecordingSink {
        granted: bool,
        notifications: Mutex<Vec<LocalNotification>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                granted: true,
                notifications: Mutex::new(Vec::new()),
            }
        }

        fn denied() -> Self {
            Self {
                granted: false,
                notifications: Mutex::new(Vec::new()),
            }
        }

        fn tags(&self) -> Vec<String> {
            self.notifications
                .lock()
                .expect("notification lock poisoned")
                .iter()
                .map(|notification| notification.tag.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ReminderSink for RecordingSink {
        fn permission_granted(&self) -> bool {
            self.granted
        }

        async fn notify(&self, notification: LocalNotification) {
            self.notifications
                .lock()
                .expect("notification lock poisoned")
                .push(notification);
        }
    }

    fn oslo() -> Tz {
        "Europe/Oslo".parse().expect("known timezone")
    }

    // 08:58 local on the sample task date.
    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-16T07:58:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn scheduler(sink: Arc<RecordingSink>) -> ReminderScheduler {
        ReminderScheduler::new(oslo(), "/icon.png", sink).with_now_provider(Arc::new(fixed_now))
    }

    #[tokio::test(start_paused = true)]
    async fn arms_only_future_candidates() {
        let sink = Arc::new(RecordingSink::new());
        let mut scheduler = scheduler(Arc::clone(&sink));

        // Task starts in 2 minutes: the pre-warning offset is already past.
        let report = scheduler.arm(&[sample_task("tsk-1", "09:00", 50)]);

        let kinds: Vec<ReminderKind> = report.armed.iter().map(|armed| armed.kind).collect();
        assert_eq!(kinds, vec![ReminderKind::Start, ReminderKind::Nudge]);
        assert!(report.skipped.is_empty());

        // Start fires at +2min, nudge at +55min.
        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(sink.tags(), vec!["task-tsk-1-start"]);

        tokio::time::sleep(Duration::from_secs(55 * 60)).await;
        assert_eq!(sink.tags(), vec!["task-tsk-1-start", "task-tsk-1-nudge"]);
    }

    #[tokio::test(start_paused = true)]
    async fn fired_notification_composes_title_with_emoji() {
        let sink = Arc::new(RecordingSink::new());
        let mut scheduler = scheduler(Arc::clone(&sink));
        scheduler.arm(&[sample_task("tsk-1", "09:00", 50)]);

        tokio::time::sleep(Duration::from_secs(121)).await;
        let notifications = sink.notifications.lock().expect("notification lock poisoned");
        assert_eq!(notifications[0].title, "📝 Skrive rapport");
        assert_eq!(notifications[0].body, "Det er tid for å starte!");
        assert_eq!(notifications[0].icon, "/icon.png");
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_outstanding_batch() {
        let sink = Arc::new(RecordingSink::new());
        let mut scheduler = scheduler(Arc::clone(&sink));

        scheduler.arm(&[sample_task("tsk-old", "09:00", 50)]);
        scheduler.arm(&[sample_task("tsk-new", "09:01", 50)]);

        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        let tags = sink.tags();
        assert!(tags.iter().all(|tag| tag.contains("tsk-new")), "old batch fired: {tags:?}");
        assert_eq!(tags.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_is_total() {
        let sink = Arc::new(RecordingSink::new());
        let mut scheduler = scheduler(Arc::clone(&sink));
        let report = scheduler.arm(&[sample_task("tsk-1", "09:00", 50)]);
        assert_eq!(report.armed.len(), 2);

        scheduler.cancel_all();
        tokio::time::sleep(Duration::from_secs(2 * 60 * 60)).await;
        assert!(sink.tags().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_scheduler_cancels_armed_callbacks() {
        let sink = Arc::new(RecordingSink::new());
        let mut scheduler = scheduler(Arc::clone(&sink));
        scheduler.arm(&[sample_task("tsk-1", "09:00", 50)]);
        drop(scheduler);

        tokio::time::sleep(Duration::from_secs(2 * 60 * 60)).await;
        assert!(sink.tags().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn completed_tasks_and_denied_permission_arm_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let mut scheduler = scheduler(Arc::clone(&sink));
        let mut completed = sample_task("tsk-done", "09:00", 50);
        completed.completed = true;
        assert!(scheduler.arm(&[completed]).armed.is_empty());

        let denied = Arc::new(RecordingSink::denied());
        let mut scheduler = ReminderScheduler::new(oslo(), "/icon.png", Arc::clone(&denied) as Arc<dyn ReminderSink>)
            .with_now_provider(Arc::new(fixed_now));
        assert!(scheduler.arm(&[sample_task("tsk-1", "09:00", 50)]).armed.is_empty());

        tokio::time::sleep(Duration::from_secs(2 * 60 * 60)).await;
        assert!(sink.tags().is_empty());
        assert!(denied.tags().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_task_is_reported_and_does_not_abort_the_batch() {
        let sink = Arc::new(RecordingSink::new());
        let mut scheduler = scheduler(Arc::clone(&sink));

        let report = scheduler.arm(&[
            sample_task("tsk-broken", "halv ni", 30),
            sample_task("tsk-ok", "09:00", 50),
        ]);

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].task_id, "tsk-broken");
        assert_eq!(report.armed.len(), 2);
        assert!(report.armed.iter().all(|armed| armed.task_id == "tsk-ok"));
    }
}
