use crate::domain::models::Subscription;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use web_push::{
    ContentEncoding, HyperWebPushClient, SubscriptionInfo, URL_SAFE_NO_PAD, VapidSignatureBuilder,
    WebPushClient, WebPushError, WebPushMessageBuilder,
};

/// Payload delivered to the service worker. The display title carries the
/// task emoji up front.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub icon: String,
}

/// Delivery failure, split the only way the dispatcher cares about: a gone
/// endpoint retires the subscription, anything else is retried on the next
/// external trigger.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushSendError {
    #[error("push endpoint gone")]
    Gone,
    #[error("push delivery failed: {0}")]
    Transient(String),
}

#[async_trait]
pub trait PushClient: Send + Sync {
    async fn send(&self, subscription: &Subscription, payload: &PushPayload)
    -> Result<(), PushSendError>;
}

/// Web-push transport with VAPID authorization. The underlying client owns
/// connection timeouts, so one delivery attempt is always bounded.
pub struct VapidPushClient {
    client: HyperWebPushClient,
    vapid_subject: String,
    vapid_private_key: String,
    ttl_seconds: u32,
}

impl VapidPushClient {
    pub fn new(vapid_subject: impl Into<String>, vapid_private_key: impl Into<String>) -> Self {
        Self {
            client: HyperWebPushClient::new(),
            vapid_subject: vapid_subject.into(),
            vapid_private_key: vapid_private_key.into(),
            ttl_seconds: 3600,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: u32) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }
}

#[async_trait]
impl PushClient for VapidPushClient {
    async fn send(
        &self,
        subscription: &Subscription,
        payload: &PushPayload,
    ) -> Result<(), PushSendError> {
        let subscription_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut signature_builder = VapidSignatureBuilder::from_base64(
            &self.vapid_private_key,
            URL_SAFE_NO_PAD,
            &subscription_info,
        )
        .map_err(classify)?;
        signature_builder.add_claim("sub", self.vapid_subject.as_str());
        let signature = signature_builder.build().map_err(classify)?;

        let body = serde_json::to_vec(payload)
            .map_err(|error| PushSendError::Transient(error.to_string()))?;

        let mut message_builder = WebPushMessageBuilder::new(&subscription_info);
        message_builder.set_ttl(self.ttl_seconds);
        message_builder.set_vapid_signature(signature);
        message_builder.set_payload(ContentEncoding::Aes128Gcm, &body);
        let message = message_builder.build().map_err(classify)?;

        self.client.send(message).await.map_err(classify)
    }
}

fn classify(error: WebPushError) -> PushSendError {
    match error {
        // 404/410 from the push service: the endpoint will never work again.
        WebPushError::EndpointNotFound | WebPushError::EndpointNotValid => {
            PushSendError::Gone
        }
        other => PushSendError::Transient(other.to_string()),
    }
}
