//! HTTP API
//!
//! JSON routes over the store and dispatcher:
//!
//! | route | purpose |
//! |---|---|
//! | `GET/POST /api/producers` | list, create |
//! | `GET/PUT/DELETE /api/producers/{id}` | read, replace, delete (cascades) |
//! | `POST /api/producers/{id}` | receive a producer webhook (acknowledge) |
//! | `GET /api/producers/{id}/sample` | starter payload |
//! | `POST /api/producers/{id}/preview` | validate and transform for every consumer |
//! | `GET /api/producers/{id}/consumers` | consumers of a producer |
//! | `POST /api/consumers` | create (validated against its producer) |
//! | `GET/PUT/DELETE /api/consumers/{id}` | read, replace, delete |
//! | `POST /api/consumers/{id}/trigger` | transform and deliver |
//! | `GET /api/consumers/{id}/logs` | delivery log for a consumer |
//! | `GET /api/logs` | recent delivery log |
//! | `POST /api/test` | send a payload to an arbitrary URL |
//! | `GET /api/health` | liveness |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use hookwire_core::expression::truthy;
use hookwire_core::{
    Consumer, NewConsumer, NewProducer, Producer, WebhookLog, sample_payload, validate_consumer,
    validate_producer,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::delivery::DeliveryResult;
use crate::dispatch::{Dispatcher, Preview, TriggerOutcome};
use crate::error::Error;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    dispatcher: Dispatcher,
}

impl AppState {
    /// Wrap a dispatcher for the router
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// The dispatcher behind the routes
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/producers", get(list_producers).post(create_producer))
        .route(
            "/api/producers/{id}",
            get(get_producer)
                .put(update_producer)
                .delete(delete_producer)
                .post(receive_webhook),
        )
        .route("/api/producers/{id}/sample", get(producer_sample))
        .route("/api/producers/{id}/preview", post(preview))
        .route("/api/producers/{id}/consumers", get(producer_consumers))
        .route("/api/consumers", get(list_consumers).post(create_consumer))
        .route(
            "/api/consumers/{id}",
            get(get_consumer)
                .put(update_consumer)
                .delete(delete_consumer),
        )
        .route("/api/consumers/{id}/trigger", post(trigger))
        .route("/api/consumers/{id}/logs", get(consumer_logs))
        .route("/api/logs", get(recent_logs))
        .route("/api/test", post(test_webhook))
        .with_state(state)
}

/// Error response: a status plus a JSON body with at least `error`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": error.into() }),
        }
    }

    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Some(body) = self.body.as_object_mut() {
            body.insert(key.to_string(), value.into());
        }
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, "Invalid JSON body")
            .with("message", rejection.body_text())
    }
}

impl From<hookwire_core::Error> for ApiError {
    fn from(err: hookwire_core::Error) -> Self {
        use hookwire_core::Error as E;
        let message = err.to_string();
        match err {
            E::ProducerNotFound { .. } | E::ConsumerNotFound { .. } => {
                ApiError::new(StatusCode::NOT_FOUND, message)
            }
            E::InvalidProducer { errors, .. } | E::InvalidConsumer { errors, .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, message).with("errors", errors)
            }
            E::Conflict { .. } => ApiError::new(StatusCode::CONFLICT, message),
            _ => {
                tracing::error!(error = %message, "request failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Core(e) => e.into(),
            Error::InvalidPayload { errors } => {
                ApiError::new(StatusCode::BAD_REQUEST, "Payload failed validation")
                    .with("errors", errors)
            }
            other => {
                tracing::error!(error = %other, "request failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

// =============================================================================
// Producers
// =============================================================================

async fn list_producers(State(state): State<AppState>) -> ApiResult<Json<Vec<Producer>>> {
    Ok(Json(state.dispatcher.store().list_producers().await?))
}

async fn create_producer(
    State(state): State<AppState>,
    body: Result<Json<NewProducer>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Producer>)> {
    let Json(input) = body?;
    validate_producer(&input)?;
    let producer = state.dispatcher.store().create_producer(input).await?;
    tracing::info!(producer = %producer.id, "created producer");
    Ok((StatusCode::CREATED, Json(producer)))
}

async fn get_producer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Producer>> {
    Ok(Json(load_producer(&state, &id).await?))
}

async fn update_producer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<NewProducer>, JsonRejection>,
) -> ApiResult<Json<Producer>> {
    let Json(input) = body?;
    validate_producer(&input)?;
    Ok(Json(
        state.dispatcher.store().update_producer(&id, input).await?,
    ))
}

async fn delete_producer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.dispatcher.store().delete_producer(&id).await? {
        tracing::info!(producer = %id, "deleted producer");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(hookwire_core::Error::ProducerNotFound { id }.into())
    }
}

/// Acknowledge a payload sent to a producer endpoint
async fn receive_webhook(
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(_payload) = body.map_err(|e| {
        ApiError::new(StatusCode::BAD_REQUEST, "Failed to process webhook")
            .with("message", e.body_text())
    })?;
    tracing::debug!(producer = %id, "webhook received");
    Ok(Json(json!({
        "success": true,
        "message": "Webhook received",
        "producerId": id,
        "timestamp": Utc::now(),
    })))
}

async fn producer_sample(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Map<String, Value>>> {
    let producer = load_producer(&state, &id).await?;
    Ok(Json(sample_payload(&producer)))
}

async fn preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Preview>> {
    let Json(payload) = body?;
    Ok(Json(state.dispatcher.preview(&id, &payload).await?))
}

async fn producer_consumers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Consumer>>> {
    load_producer(&state, &id).await?;
    Ok(Json(
        state.dispatcher.store().consumers_for_producer(&id).await?,
    ))
}

async fn load_producer(state: &AppState, id: &str) -> ApiResult<Producer> {
    state
        .dispatcher
        .store()
        .get_producer(id)
        .await?
        .ok_or_else(|| hookwire_core::Error::ProducerNotFound { id: id.to_string() }.into())
}

// =============================================================================
// Consumers
// =============================================================================

async fn list_consumers(State(state): State<AppState>) -> ApiResult<Json<Vec<Consumer>>> {
    Ok(Json(state.dispatcher.store().list_consumers().await?))
}

async fn create_consumer(
    State(state): State<AppState>,
    body: Result<Json<NewConsumer>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Consumer>)> {
    let Json(input) = body?;
    let producer = load_producer(&state, &input.producer_id).await?;
    validate_consumer(&input, &producer)?;
    let consumer = state.dispatcher.store().create_consumer(input).await?;
    tracing::info!(consumer = %consumer.id, producer = %producer.id, "created consumer");
    Ok((StatusCode::CREATED, Json(consumer)))
}

async fn get_consumer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Consumer>> {
    state
        .dispatcher
        .store()
        .get_consumer(&id)
        .await?
        .map(Json)
        .ok_or_else(|| hookwire_core::Error::ConsumerNotFound { id }.into())
}

async fn update_consumer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<NewConsumer>, JsonRejection>,
) -> ApiResult<Json<Consumer>> {
    let Json(input) = body?;
    let producer = load_producer(&state, &input.producer_id).await?;
    validate_consumer(&input, &producer)?;
    Ok(Json(
        state.dispatcher.store().update_consumer(&id, input).await?,
    ))
}

async fn delete_consumer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.dispatcher.store().delete_consumer(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(hookwire_core::Error::ConsumerNotFound { id }.into())
    }
}

async fn trigger(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<TriggerOutcome>> {
    let Json(payload) = body?;
    Ok(Json(state.dispatcher.trigger(&id, &payload).await?))
}

async fn consumer_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<WebhookLog>>> {
    Ok(Json(state.dispatcher.store().logs_for_consumer(&id).await?))
}

async fn recent_logs(State(state): State<AppState>) -> ApiResult<Json<Vec<WebhookLog>>> {
    Ok(Json(state.dispatcher.store().recent_logs().await?))
}

// =============================================================================
// Test delivery
// =============================================================================

#[derive(Debug, Deserialize)]
struct TestRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
}

/// Send a payload to an arbitrary URL and report what came back
async fn test_webhook(
    State(state): State<AppState>,
    body: Result<Json<TestRequest>, JsonRejection>,
) -> ApiResult<Json<DeliveryResult>> {
    let Json(request) = body?;
    let url = request.url.filter(|u| !u.trim().is_empty());
    let payload = request.payload.filter(truthy);
    let (Some(url), Some(payload)) = (url, payload) else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Missing url or payload",
        ));
    };

    match state.dispatcher.client().deliver(&url, &payload).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => Err(
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send test webhook")
                .with("message", e.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::WebhookClient;
    use crate::testing::spawn_target;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use hookwire_core::MemoryStore;
    use hookwire_core::config::DeliveryConfig;
    use rstest::rstest;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let store = Arc::new(MemoryStore::new());
        let client = WebhookClient::new(&DeliveryConfig::default()).unwrap();
        router(AppState::new(Dispatcher::new(store, client)))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    const PRODUCER: &str = r#"{
        "id": "signups",
        "name": "Signups",
        "attributes": [
            {"key": "userId", "type": "int"},
            {"key": "email", "type": "string"}
        ]
    }"#;

    fn consumer(webhook_url: &str) -> String {
        json!({
            "id": "crm",
            "producerId": "signups",
            "name": "CRM",
            "webhookUrl": webhook_url,
            "attributes": [
                {"key": "id", "type": "int", "mappingType": "direct", "producerAttributeKey": "userId"},
                {"key": "contact", "type": "string", "mappingType": "expression", "expression": "'mailto:' + ${email}"}
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_and_fetch_producer() {
        let app = app();
        let (status, created) = send(&app, Method::POST, "/api/producers", Some(PRODUCER)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["endpoint"], "/api/producers/signups");
        assert_eq!(created["status"], "active");
        assert!(created["createdAt"].is_string());

        let (status, fetched) = send(&app, Method::GET, "/api/producers/signups", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let (_, list) = send(&app, Method::GET, "/api/producers", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = app();
        let (status, body) = send(&app, Method::POST, "/api/producers", Some("{nope")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(&app, Method::POST, "/api/producers/x", Some("{nope")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Failed to process webhook");
    }

    #[tokio::test]
    async fn test_receive_webhook_acknowledges() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/api/producers/abc",
            Some(r#"{"anything": [1, 2]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Webhook received");
        assert_eq!(body["producerId"], "abc");
        assert!(body["timestamp"].is_string());
    }

    #[rstest]
    #[case(Method::GET, "/api/producers/nope")]
    #[case(Method::GET, "/api/producers/nope/sample")]
    #[case(Method::GET, "/api/producers/nope/consumers")]
    #[case(Method::DELETE, "/api/producers/nope")]
    #[case(Method::GET, "/api/consumers/nope")]
    #[case(Method::DELETE, "/api/consumers/nope")]
    #[tokio::test]
    async fn test_missing_records_are_not_found(#[case] method: Method, #[case] uri: &str) {
        let (status, body) = send(&app(), method, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_invalid_consumer_rejected_with_errors() {
        let app = app();
        send(&app, Method::POST, "/api/producers", Some(PRODUCER)).await;
        let body = json!({
            "producerId": "signups",
            "name": "Bad",
            "webhookUrl": "http://localhost/hook",
            "attributes": [
                {"key": "x", "type": "int", "mappingType": "direct", "producerAttributeKey": "ghost"},
                {"key": "y", "type": "int", "mappingType": "expression", "expression": "${userId}; 1"}
            ]
        })
        .to_string();
        let (status, response) = send(&app, Method::POST, "/api/consumers", Some(&body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sample_and_preview() {
        let app = app();
        send(&app, Method::POST, "/api/producers", Some(PRODUCER)).await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/consumers",
            Some(&consumer("http://localhost/hook")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, sample) = send(&app, Method::GET, "/api/producers/signups/sample", None).await;
        assert_eq!(sample, json!({"userId": 0, "email": ""}));

        let (status, preview) = send(
            &app,
            Method::POST,
            "/api/producers/signups/preview",
            Some(r#"{"userId": 5, "email": "a@b.c"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(preview["validation"]["valid"], true);
        assert_eq!(
            preview["consumers"][0]["payload"],
            json!({"id": 5, "contact": "mailto:a@b.c"})
        );
    }

    #[tokio::test]
    async fn test_delete_producer_cascades() {
        let app = app();
        send(&app, Method::POST, "/api/producers", Some(PRODUCER)).await;
        send(
            &app,
            Method::POST,
            "/api/consumers",
            Some(&consumer("http://localhost/hook")),
        )
        .await;

        let (status, _) = send(&app, Method::DELETE, "/api/producers/signups", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::GET, "/api/consumers/crm", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_trigger_records_log() {
        let target = Router::new().route("/hook", post(|| async { Json(json!({"ok": 1})) }));
        let url = spawn_target(target).await;

        let app = app();
        send(&app, Method::POST, "/api/producers", Some(PRODUCER)).await;
        send(
            &app,
            Method::POST,
            "/api/consumers",
            Some(&consumer(&format!("{url}/hook"))),
        )
        .await;

        let (status, outcome) = send(
            &app,
            Method::POST,
            "/api/consumers/crm/trigger",
            Some(r#"{"userId": 1, "email": "x@y.z"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["log"]["status"], "success");
        assert_eq!(outcome["result"]["data"], json!({"ok": 1}));

        let (_, logs) = send(&app, Method::GET, "/api/consumers/crm/logs", None).await;
        assert_eq!(logs.as_array().unwrap().len(), 1);
        let (_, all) = send(&app, Method::GET, "/api/logs", None).await;
        assert_eq!(all.as_array().unwrap().len(), 1);

        let (_, consumer) = send(&app, Method::GET, "/api/consumers/crm", None).await;
        assert!(consumer["lastTriggered"].is_string());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/consumers/crm/trigger",
            Some(r#"{"userId": "one", "email": "x@y.z"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0], "Invalid type for userId: expected int, got string");
    }

    #[tokio::test]
    async fn test_test_endpoint() {
        let target = Router::new().route("/hook", post(|| async { "thanks" }));
        let url = spawn_target(target).await;
        let app = app();

        let request = json!({"url": format!("{url}/hook"), "payload": {"a": 1}}).to_string();
        let (status, body) = send(&app, Method::POST, "/api/test", Some(&request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], 200);
        assert_eq!(body["statusText"], "OK");
        assert_eq!(body["data"], "thanks");
        assert_eq!(body["success"], true);

        for missing in [
            r#"{"payload": {"a": 1}}"#,
            r#"{"url": "", "payload": {}}"#,
            r#"{"url": "http://x"}"#,
            r#"{"url": "http://x", "payload": 0}"#,
            r#"{"url": "http://x", "payload": false}"#,
            r#"{"url": "http://x", "payload": ""}"#,
        ] {
            let (status, body) = send(&app, Method::POST, "/api/test", Some(missing)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{missing}");
            assert_eq!(body["error"], "Missing url or payload");
        }
    }

    #[tokio::test]
    async fn test_test_endpoint_network_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = json!({"url": format!("http://{addr}/hook"), "payload": {"a": 1}}).to_string();
        let (status, body) = send(&app(), Method::POST, "/api/test", Some(&request)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to send test webhook");
        assert!(body["message"].is_string());
    }
}
