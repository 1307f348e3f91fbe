use crate::domain::models::{NotificationRecord, Subscription};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::store::KeyValueStore;
use std::collections::HashSet;

pub const SUBSCRIPTION_KEY: &str = "push:subscription";
pub const SCHEDULE_KEY: &str = "push:schedule";
pub const SENT_KEY: &str = "push:sent";

/// Typed access to the relay's three pieces of shared state. Replacing the
/// schedule clears the sent set in the same call: ids repeat from day to day,
/// so they are only meaningful within one schedule generation.
pub trait PushStateRepository: Send + Sync {
    fn load_subscription(&self) -> Result<Option<Subscription>, InfraError>;
    fn save_subscription(&self, subscription: &Subscription) -> Result<(), InfraError>;
    fn delete_subscription(&self) -> Result<(), InfraError>;
    fn load_schedule(&self) -> Result<Option<Vec<NotificationRecord>>, InfraError>;
    fn replace_schedule(&self, records: &[NotificationRecord]) -> Result<(), InfraError>;
    fn load_sent(&self) -> Result<HashSet<String>, InfraError>;
    fn save_sent(&self, sent: &HashSet<String>) -> Result<(), InfraError>;
}

/// JSON-over-key-value implementation; the only one in production use.
#[derive(Debug, Clone)]
pub struct KvPushStateRepository<K: KeyValueStore> {
    store: K,
}

impl<K: KeyValueStore> KvPushStateRepository<K> {
    pub fn new(store: K) -> Self {
        Self { store }
    }

    fn load_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, InfraError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        let parsed = serde_json::from_str(&raw)
            .map_err(|error| InfraError::Store(format!("corrupt value under '{key}': {error}")))?;
        Ok(Some(parsed))
    }

    fn save_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), InfraError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)
    }
}

impl<K: KeyValueStore> PushStateRepository for KvPushStateRepository<K> {
    fn load_subscription(&self) -> Result<Option<Subscription>, InfraError> {
        self.load_json(SUBSCRIPTION_KEY)
    }

    fn save_subscription(&self, subscription: &Subscription) -> Result<(), InfraError> {
        self.save_json(SUBSCRIPTION_KEY, subscription)
    }

    fn delete_subscription(&self) -> Result<(), InfraError> {
        self.store.delete(SUBSCRIPTION_KEY)
    }

    fn load_schedule(&self) -> Result<Option<Vec<NotificationRecord>>, InfraError> {
        self.load_json(SCHEDULE_KEY)
    }

    fn replace_schedule(&self, records: &[NotificationRecord]) -> Result<(), InfraError> {
        self.save_json(SCHEDULE_KEY, &records)?;
        self.store.delete(SENT_KEY)
    }

    fn load_sent(&self) -> Result<HashSet<String>, InfraError> {
        Ok(self
            .load_json::<Vec<String>>(SENT_KEY)?
            .map(|ids| ids.into_iter().collect())
            .unwrap_or_default())
    }

    fn save_sent(&self, sent: &HashSet<String>) -> Result<(), InfraError> {
        // Stored sorted so repeated saves of the same set are byte-identical.
        let mut ids: Vec<&String> = sent.iter().collect();
        ids.sort();
        self.save_json(SENT_KEY, &ids)
    }
}
