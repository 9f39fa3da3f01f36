//! Dispatch pipeline
//!
//! Ties the store, the transformer and the webhook client together:
//!
//! ```text
//! payload ──▶ defaults ──▶ validate ──▶ transform ──▶ deliver ──▶ log
//! ```
//!
//! Previews stop after the transform step. Triggers always end with a log
//! entry, whether or not the remote endpoint could be reached.

use std::sync::Arc;

use chrono::Utc;
use hookwire_core::{
    Consumer, DeliveryStatus, MappingDiagnostic, Producer, Store, ValidationResult, WebhookLog,
    apply_defaults, transform_with_diagnostics, validate_payload,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::delivery::{DeliveryResult, WebhookClient};
use crate::error::{Error, Result};

/// Preview of a payload against a producer and all its consumers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    /// Producer the payload was checked against
    pub producer_id: String,

    /// Schema check of the payload after defaults were applied
    pub validation: ValidationResult,

    /// One transformed payload per consumer
    pub consumers: Vec<ConsumerPreview>,
}

/// Transformed payload for one consumer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerPreview {
    /// Consumer id
    pub consumer_id: String,

    /// Consumer display name
    pub consumer_name: String,

    /// Where the payload would be sent
    pub webhook_url: String,

    /// Transformed payload
    pub payload: Map<String, Value>,

    /// Mappings that fell back to null
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<MappingDiagnostic>,
}

/// Outcome of a manual trigger
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerOutcome {
    /// Log entry that was recorded
    pub log: WebhookLog,

    /// Remote answer, absent when the request never completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DeliveryResult>,
}

/// Runs previews and deliveries against a store
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn Store>,
    client: WebhookClient,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(store: Arc<dyn Store>, client: WebhookClient) -> Self {
        Self { store, client }
    }

    /// The backing store
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The webhook client
    pub fn client(&self) -> &WebhookClient {
        &self.client
    }

    /// Validate `payload` and transform it for every consumer of a producer.
    ///
    /// Nothing is delivered. An invalid payload is still transformed so
    /// the caller can see what each consumer would receive.
    pub async fn preview(&self, producer_id: &str, payload: &Value) -> Result<Preview> {
        let producer = self.producer(producer_id).await?;
        let (data, validation) = prepare(payload, &producer);

        let consumers = self
            .store
            .consumers_for_producer(producer_id)
            .await?
            .into_iter()
            .map(|consumer| {
                let (payload, diagnostics) =
                    transform_with_diagnostics(&data, &consumer, &producer);
                ConsumerPreview {
                    consumer_id: consumer.id,
                    consumer_name: consumer.name,
                    webhook_url: consumer.webhook_url,
                    payload,
                    diagnostics,
                }
            })
            .collect();

        Ok(Preview {
            producer_id: producer.id,
            validation,
            consumers,
        })
    }

    /// Transform `payload` for one consumer and deliver it.
    ///
    /// The payload must satisfy the producer schema (after defaults).
    /// Delivery failures are recorded as a `failed` log entry rather than
    /// returned as errors.
    pub async fn trigger(&self, consumer_id: &str, payload: &Value) -> Result<TriggerOutcome> {
        let consumer = self.consumer(consumer_id).await?;
        let producer = self.producer(&consumer.producer_id).await?;

        let (data, validation) = prepare(payload, &producer);
        if !validation.valid {
            return Err(Error::InvalidPayload {
                errors: validation.errors,
            });
        }

        let (output, diagnostics) = transform_with_diagnostics(&data, &consumer, &producer);
        if !diagnostics.is_empty() {
            tracing::warn!(
                consumer = %consumer.id,
                nulls = diagnostics.len(),
                "some mappings produced null"
            );
        }
        let outbound = Value::Object(output);

        let (log, result) = match self.client.deliver(&consumer.webhook_url, &outbound).await {
            Ok(result) => {
                let status = if result.success {
                    DeliveryStatus::Success
                } else {
                    DeliveryStatus::Failed
                };
                let log = WebhookLog::new(&consumer.id, &producer.id, status, outbound)
                    .with_response(serde_json::to_value(&result).unwrap_or(Value::Null));
                (log, Some(result))
            }
            Err(e) => {
                tracing::warn!(consumer = %consumer.id, error = %e, "webhook delivery failed");
                let log = WebhookLog::new(
                    &consumer.id,
                    &producer.id,
                    DeliveryStatus::Failed,
                    outbound,
                )
                .with_error(e.to_string());
                (log, None)
            }
        };

        self.store.append_log(log.clone()).await?;
        self.store.mark_triggered(&consumer.id, log.timestamp).await?;
        tracing::info!(
            consumer = %consumer.id,
            producer = %producer.id,
            status = ?log.status,
            "webhook triggered"
        );

        Ok(TriggerOutcome { log, result })
    }

    async fn producer(&self, id: &str) -> Result<Producer> {
        self.store
            .get_producer(id)
            .await?
            .ok_or_else(|| hookwire_core::Error::ProducerNotFound { id: id.to_string() }.into())
    }

    async fn consumer(&self, id: &str) -> Result<Consumer> {
        self.store
            .get_consumer(id)
            .await?
            .ok_or_else(|| hookwire_core::Error::ConsumerNotFound { id: id.to_string() }.into())
    }
}

/// Apply defaults and validate; non-object payloads become an empty map
fn prepare(payload: &Value, producer: &Producer) -> (Map<String, Value>, ValidationResult) {
    let Some(object) = payload.as_object() else {
        return (
            Map::new(),
            ValidationResult::from_errors(vec!["Payload must be a JSON object".to_string()]),
        );
    };
    let mut data = object.clone();
    apply_defaults(&mut data, producer);
    let validation = validate_payload(&Value::Object(data.clone()), producer);
    (data, validation)
}
