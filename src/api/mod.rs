use crate::application::push_dispatcher::PushDispatcher;
use crate::domain::models::{NotificationRecord, Subscription, SubscriptionKeys};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::push_client::{PushClient, PushPayload};
use crate::infrastructure::push_state::PushStateRepository;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

type ApiResponse = (StatusCode, Json<serde_json::Value>);

/// Shared handler state. The router itself carries no logic: every endpoint
/// is a thin translation between HTTP and the services below.
pub struct ApiState<S, C>
where
    S: PushStateRepository,
    C: PushClient,
{
    repository: Arc<S>,
    dispatcher: Arc<PushDispatcher<S, C>>,
    push_client: Arc<C>,
    cron_secret: String,
    icon: String,
}

impl<S, C> ApiState<S, C>
where
    S: PushStateRepository,
    C: PushClient,
{
    pub fn new(
        repository: Arc<S>,
        dispatcher: Arc<PushDispatcher<S, C>>,
        push_client: Arc<C>,
        cron_secret: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            push_client,
            cron_secret: cron_secret.into(),
            icon: icon.into(),
        }
    }
}

impl<S, C> Clone for ApiState<S, C>
where
    S: PushStateRepository,
    C: PushClient,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            dispatcher: Arc::clone(&self.dispatcher),
            push_client: Arc::clone(&self.push_client),
            cron_secret: self.cron_secret.clone(),
            icon: self.icon.clone(),
        }
    }
}

pub fn router<S, C>(state: ApiState<S, C>) -> Router
where
    S: PushStateRepository + 'static,
    C: PushClient + 'static,
{
    Router::new()
        .route("/api/push/subscribe", post(subscribe::<S, C>))
        .route("/api/push/schedule", post(schedule::<S, C>))
        .route("/api/push/tick", get(tick::<S, C>).post(tick::<S, C>))
        .route("/api/push/debug", get(debug_state::<S, C>))
        .route("/api/push/test-send", post(test_send::<S, C>))
        .with_state(state)
}

fn bearer_is_valid(headers: &HeaderMap, expected: &str) -> bool {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let candidate = header_value
        .strip_prefix("Bearer ")
        .unwrap_or_default()
        .trim();
    !expected.is_empty() && candidate == expected
}

fn client_error(message: &str) -> ApiResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
}

fn unauthorized() -> ApiResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "Unauthorized"})),
    )
}

fn internal_error(error: &InfraError) -> ApiResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": error.to_string()})),
    )
}

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    endpoint: Option<String>,
    keys: Option<SubscribeKeysRequest>,
}

#[derive(Debug, Deserialize)]
struct SubscribeKeysRequest {
    p256dh: Option<String>,
    auth: Option<String>,
}

async fn subscribe<S, C>(
    State(state): State<ApiState<S, C>>,
    Json(body): Json<SubscribeRequest>,
) -> ApiResponse
where
    S: PushStateRepository,
    C: PushClient,
{
    let Some(endpoint) = body.endpoint else {
        return client_error("Invalid subscription");
    };
    let Some(keys) = body.keys else {
        return client_error("Subscription missing auth/p256dh keys");
    };
    let (Some(p256dh), Some(auth)) = (keys.p256dh, keys.auth) else {
        return client_error("Subscription missing auth/p256dh keys");
    };

    let subscription = Subscription {
        endpoint,
        keys: SubscriptionKeys { p256dh, auth },
    };
    if let Err(detail) = subscription.validate() {
        return client_error(&detail);
    }

    match state.repository.save_subscription(&subscription) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))),
        Err(error) => internal_error(&error),
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleRequest {
    notifications: Option<serde_json::Value>,
}

async fn schedule<S, C>(
    State(state): State<ApiState<S, C>>,
    Json(body): Json<ScheduleRequest>,
) -> ApiResponse
where
    S: PushStateRepository,
    C: PushClient,
{
    let Some(notifications) = body.notifications.filter(serde_json::Value::is_array) else {
        return client_error("Invalid notifications array");
    };
    let records: Vec<NotificationRecord> = match serde_json::from_value(notifications) {
        Ok(records) => records,
        Err(error) => {
            return client_error(&format!("Invalid notification record: {error}"));
        }
    };

    match state.repository.replace_schedule(&records) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"ok": true, "count": records.len()})),
        ),
        Err(error) => internal_error(&error),
    }
}

#[derive(Debug, Default, Deserialize)]
struct TickQuery {
    #[serde(default)]
    trace: bool,
}

async fn tick<S, C>(
    State(state): State<ApiState<S, C>>,
    Query(query): Query<TickQuery>,
    headers: HeaderMap,
) -> ApiResponse
where
    S: PushStateRepository,
    C: PushClient,
{
    if !bearer_is_valid(&headers, &state.cron_secret) {
        return unauthorized();
    }

    match state.dispatcher.run_traced().await {
        Ok((outcome, traces)) => {
            let mut body = serde_json::json!({"sent": outcome.sent});
            if outcome.subscription_gone {
                body["error"] = serde_json::Value::from("Subscription expired");
            }
            if query.trace {
                body["trace"] = serde_json::to_value(&traces).unwrap_or_default();
            }
            (StatusCode::OK, Json(body))
        }
        Err(error) => internal_error(&error),
    }
}

async fn debug_state<S, C>(
    State(state): State<ApiState<S, C>>,
    headers: HeaderMap,
) -> ApiResponse
where
    S: PushStateRepository,
    C: PushClient,
{
    if !bearer_is_valid(&headers, &state.cron_secret) {
        return unauthorized();
    }
    match debug_payload(state.repository.as_ref()) {
        Ok(payload) => (StatusCode::OK, Json(payload)),
        Err(error) => internal_error(&error),
    }
}

fn debug_payload<S: PushStateRepository>(
    repository: &S,
) -> Result<serde_json::Value, InfraError> {
    let subscription = repository.load_subscription()?;
    let schedule = repository.load_schedule()?;
    let mut sent: Vec<String> = repository.load_sent()?.into_iter().collect();
    sent.sort();

    // Only the endpoint tail: enough to recognize the device, never the
    // full capability URL.
    let endpoint_preview = subscription
        .as_ref()
        .map(|subscription| {
            let endpoint = subscription.endpoint.as_str();
            let tail_start = endpoint.len().saturating_sub(20);
            endpoint
                .char_indices()
                .map(|(index, _)| index)
                .find(|&index| index >= tail_start)
                .map(|index| endpoint[index..].to_string())
                .unwrap_or_default()
        })
        .unwrap_or_default();

    Ok(serde_json::json!({
        "hasSubscription": subscription.is_some(),
        "endpointPreview": endpoint_preview,
        "hasAuthKey": subscription
            .as_ref()
            .map(|subscription| !subscription.keys.auth.is_empty())
            .unwrap_or(false),
        "hasP256dh": subscription
            .as_ref()
            .map(|subscription| !subscription.keys.p256dh.is_empty())
            .unwrap_or(false),
        "schedule": schedule,
        "sent": sent,
        "serverTime": Utc::now().to_rfc3339(),
    }))
}

async fn test_send<S, C>(
    State(state): State<ApiState<S, C>>,
    headers: HeaderMap,
) -> ApiResponse
where
    S: PushStateRepository,
    C: PushClient,
{
    if !bearer_is_valid(&headers, &state.cron_secret) {
        return unauthorized();
    }

    let subscription = match state.repository.load_subscription() {
        Ok(Some(subscription)) => subscription,
        Ok(None) => {
            return (
                StatusCode::OK,
                Json(serde_json::json!({"error": "No subscription"})),
            );
        }
        Err(error) => return internal_error(&error),
    };

    let payload = PushPayload {
        title: "🧪 Test fra Neurominder".to_string(),
        body: "Push-varsling fungerer!".to_string(),
        tag: "test".to_string(),
        icon: state.icon.clone(),
    };

    // Diagnostic endpoint: delivery failures are reported in-band.
    match state.push_client.send(&subscription, &payload).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))),
        Err(error) => (
            StatusCode::OK,
            Json(serde_json::json!({"error": error.to_string()})),
        ),
    }
}
