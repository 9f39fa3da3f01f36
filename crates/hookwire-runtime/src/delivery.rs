//! Outbound webhook delivery
//!
//! Payloads are sent as a JSON `POST`. The response body is decoded as
//! JSON when the remote declares `application/json`, otherwise kept as
//! text.

use std::time::Duration;

use hookwire_core::config::DeliveryConfig;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

const EMPTY_BODY: &str = "No response body";
const UNPARSEABLE_BODY: &str = "Unable to parse response";

/// What the remote endpoint answered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    /// HTTP status code
    pub status: u16,

    /// Canonical reason phrase for the status
    pub status_text: String,

    /// Decoded response body
    pub data: Value,

    /// Whether the status was 2xx
    pub success: bool,
}

/// HTTP client for webhook targets
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
}

impl WebhookClient {
    /// Build a client from delivery settings
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            http: builder.build()?,
        })
    }

    /// POST `payload` to `url`.
    ///
    /// Any HTTP response, including 4xx/5xx, is a successful delivery
    /// attempt; only transport failures are errors.
    pub async fn deliver(&self, url: &str, payload: &Value) -> Result<DeliveryResult> {
        tracing::debug!(url, "delivering webhook");
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Delivery {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let data = read_body(response, is_json).await;

        tracing::debug!(url, status = status.as_u16(), "webhook answered");
        Ok(DeliveryResult {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            data,
            success: status.is_success(),
        })
    }
}

async fn read_body(response: reqwest::Response, is_json: bool) -> Value {
    let Ok(text) = response.text().await else {
        return Value::from(UNPARSEABLE_BODY);
    };
    if is_json {
        serde_json::from_str(&text).unwrap_or_else(|_| Value::from(UNPARSEABLE_BODY))
    } else if text.is_empty() {
        Value::from(EMPTY_BODY)
    } else {
        Value::String(text)
    }
}
