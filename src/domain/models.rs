use serde::{Deserialize, Serialize};
use url::Url;

/// One time-boxed entry of the day plan. Owned by the task store; this crate
/// only reads it to derive reminder and session timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub emoji: String,
    pub color: String,
    /// Wall-clock start, "HH:MM".
    pub start_time: String,
    pub duration_minutes: u32,
    /// "YYYY-MM-DD".
    pub date: String,
    pub completed: bool,
}

/// Push-endpoint descriptor as handed over by the browser's push manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

impl Subscription {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.endpoint, "subscription.endpoint")?;
        Url::parse(self.endpoint.trim())
            .map_err(|_| "subscription.endpoint must be a valid URL".to_string())?;
        validate_non_empty(&self.keys.p256dh, "subscription.keys.p256dh")?;
        validate_non_empty(&self.keys.auth, "subscription.keys.auth")?;
        Ok(())
    }
}

/// Serializable form of one future reminder, relayed through the server so it
/// can be delivered with the app closed. `id` is the deduplication key: stable
/// per task and reminder kind within one schedule generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRecord {
    pub id: String,
    pub time: chrono::DateTime<chrono::Utc>,
    pub title: String,
    pub body: String,
    pub emoji: String,
    pub tag: String,
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
