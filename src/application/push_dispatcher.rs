use crate::infrastructure::error::InfraError;
use crate::infrastructure::push_client::{PushClient, PushPayload, PushSendError};
use crate::infrastructure::push_state::PushStateRepository;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Result of one dispatcher invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub sent: usize,
    /// The push service reported the endpoint permanently invalid and the
    /// stored subscription was retired mid-batch.
    pub subscription_gone: bool,
}

impl DispatchOutcome {
    fn empty() -> Self {
        Self {
            sent: 0,
            subscription_gone: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RecordStatus {
    Sent,
    AlreadySent,
    NotDue,
    NotAttempted,
    Failed,
}

/// Per-record diagnostic row for the traced variant.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecordTrace {
    pub id: String,
    pub time: DateTime<Utc>,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Idempotent delivery loop over the persisted schedule. Every invocation
/// loads subscription + schedule + sent set, delivers what is due and unsent,
/// and persists the grown sent set — so re-running before the next schedule
/// write sends nothing new. Never retries within one invocation; the next
/// external trigger is the retry.
pub struct PushDispatcher<S, C>
where
    S: PushStateRepository,
    C: PushClient,
{
    repository: Arc<S>,
    push_client: Arc<C>,
    icon: String,
    now_provider: NowProvider,
}

impl<S, C> PushDispatcher<S, C>
where
    S: PushStateRepository,
    C: PushClient,
{
    pub fn new(repository: Arc<S>, push_client: Arc<C>, icon: impl Into<String>) -> Self {
        Self {
            repository,
            push_client,
            icon: icon.into(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn run(&self) -> Result<DispatchOutcome, InfraError> {
        self.run_traced().await.map(|(outcome, _)| outcome)
    }

    pub async fn run_traced(&self) -> Result<(DispatchOutcome, Vec<RecordTrace>), InfraError> {
        let Some(subscription) = self.repository.load_subscription()? else {
            return Ok((DispatchOutcome::empty(), Vec::new()));
        };
        let Some(schedule) = self.repository.load_schedule()? else {
            return Ok((DispatchOutcome::empty(), Vec::new()));
        };
        let mut sent_set = self.repository.load_sent()?;

        let now = (self.now_provider)();
        let mut outcome = DispatchOutcome::empty();
        let mut traces = Vec::with_capacity(schedule.len());

        for record in &schedule {
            let mut trace = RecordTrace {
                id: record.id.clone(),
                time: record.time,
                status: RecordStatus::NotDue,
                error: None,
            };

            if outcome.subscription_gone {
                // The retired subscription is unusable for the whole batch.
                trace.status = RecordStatus::NotAttempted;
                traces.push(trace);
                continue;
            }
            if record.time > now {
                traces.push(trace);
                continue;
            }
            if sent_set.contains(&record.id) {
                trace.status = RecordStatus::AlreadySent;
                traces.push(trace);
                continue;
            }

            let payload = PushPayload {
                title: format!("{} {}", record.emoji, record.title),
                body: record.body.clone(),
                tag: record.tag.clone(),
                icon: self.icon.clone(),
            };

            match self.push_client.send(&subscription, &payload).await {
                Ok(()) => {
                    sent_set.insert(record.id.clone());
                    outcome.sent += 1;
                    trace.status = RecordStatus::Sent;
                }
                Err(PushSendError::Gone) => {
                    tracing::warn!(record_id = %record.id, "push endpoint gone, retiring subscription");
                    self.repository.delete_subscription()?;
                    outcome.subscription_gone = true;
                    trace.status = RecordStatus::Failed;
                    trace.error = Some(PushSendError::Gone.to_string());
                }
                Err(PushSendError::Transient(detail)) => {
                    // Left due and unsent; the next invocation retries it.
                    tracing::warn!(record_id = %record.id, error = %detail, "push delivery failed");
                    trace.status = RecordStatus::Failed;
                    trace.error = Some(detail);
                }
            }
            traces.push(trace);
        }

        if outcome.sent > 0 {
            self.repository.save_sent(&sent_set)?;
        }
        tracing::info!(
            sent = outcome.sent,
            subscription_gone = outcome.subscription_gone,
            "push dispatch finished"
        );

        Ok((outcome, traces))
    }
}
