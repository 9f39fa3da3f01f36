//! Storage interface and in-memory backing
//!
//! The [`Store`] trait is the seam between the HTTP/dispatch layer and
//! persistence. [`MemoryStore`] keeps everything in process; the runtime
//! crate provides a PostgreSQL backing behind the same trait.
//!
//! Stores enforce identity and referential rules only (unique ids, a
//! consumer's producer must exist, producer deletion cascades). Schema
//! and mapping validation happen before a record reaches the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::consumer::{Consumer, NewConsumer};
use crate::error::{Error, Result};
use crate::log::{LogRing, WebhookLog};
use crate::producer::{NewProducer, Producer};

/// Persistence for producers, consumers and the delivery log
#[async_trait]
pub trait Store: Send + Sync {
    /// Create a producer, assigning id, endpoint and creation time
    async fn create_producer(&self, input: NewProducer) -> Result<Producer>;

    /// All producers in creation order
    async fn list_producers(&self) -> Result<Vec<Producer>>;

    /// Look up a producer
    async fn get_producer(&self, id: &str) -> Result<Option<Producer>>;

    /// Replace a producer's editable fields
    async fn update_producer(&self, id: &str, input: NewProducer) -> Result<Producer>;

    /// Delete a producer and every consumer bound to it.
    ///
    /// Returns `false` when no such producer existed.
    async fn delete_producer(&self, id: &str) -> Result<bool>;

    /// Create a consumer bound to an existing producer
    async fn create_consumer(&self, input: NewConsumer) -> Result<Consumer>;

    /// All consumers in creation order
    async fn list_consumers(&self) -> Result<Vec<Consumer>>;

    /// Look up a consumer
    async fn get_consumer(&self, id: &str) -> Result<Option<Consumer>>;

    /// Replace a consumer's editable fields
    async fn update_consumer(&self, id: &str, input: NewConsumer) -> Result<Consumer>;

    /// Delete a consumer, returning `false` when it did not exist
    async fn delete_consumer(&self, id: &str) -> Result<bool>;

    /// Consumers bound to a producer, in creation order
    async fn consumers_for_producer(&self, producer_id: &str) -> Result<Vec<Consumer>>;

    /// Record the time of a consumer's latest delivery attempt
    async fn mark_triggered(&self, consumer_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Append a delivery log entry
    async fn append_log(&self, entry: WebhookLog) -> Result<()>;

    /// Log entries for one consumer, newest first
    async fn logs_for_consumer(&self, consumer_id: &str) -> Result<Vec<WebhookLog>>;

    /// Retained log entries, newest first
    async fn recent_logs(&self) -> Result<Vec<WebhookLog>>;
}

#[derive(Debug, Default)]
struct Records {
    producers: Vec<Producer>,
    consumers: Vec<Consumer>,
}

/// Process-local store; contents are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
    logs: Mutex<LogRing>,
}

impl MemoryStore {
    /// Create an empty store with the default log capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store retaining at most `capacity` log entries
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::default(),
            logs: Mutex::new(LogRing::with_capacity(capacity)),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_producer(&self, input: NewProducer) -> Result<Producer> {
        let producer = Producer::create(input);
        let mut records = self.records.write().await;
        if records.producers.iter().any(|p| p.id == producer.id) {
            return Err(Error::Conflict {
                kind: "producer",
                id: producer.id,
            });
        }
        records.producers.push(producer.clone());
        Ok(producer)
    }

    async fn list_producers(&self) -> Result<Vec<Producer>> {
        Ok(self.records.read().await.producers.clone())
    }

    async fn get_producer(&self, id: &str) -> Result<Option<Producer>> {
        let records = self.records.read().await;
        Ok(records.producers.iter().find(|p| p.id == id).cloned())
    }

    async fn update_producer(&self, id: &str, input: NewProducer) -> Result<Producer> {
        let mut records = self.records.write().await;
        let producer = records
            .producers
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::ProducerNotFound { id: id.to_string() })?;
        producer.apply(input);
        Ok(producer.clone())
    }

    async fn delete_producer(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let before = records.producers.len();
        records.producers.retain(|p| p.id != id);
        if records.producers.len() == before {
            return Ok(false);
        }
        let consumers = records.consumers.len();
        records.consumers.retain(|c| c.producer_id != id);
        tracing::debug!(
            producer = id,
            consumers = consumers - records.consumers.len(),
            "deleted producer"
        );
        Ok(true)
    }

    async fn create_consumer(&self, input: NewConsumer) -> Result<Consumer> {
        let consumer = Consumer::create(input);
        let mut records = self.records.write().await;
        if !records.producers.iter().any(|p| p.id == consumer.producer_id) {
            return Err(Error::ProducerNotFound {
                id: consumer.producer_id,
            });
        }
        if records.consumers.iter().any(|c| c.id == consumer.id) {
            return Err(Error::Conflict {
                kind: "consumer",
                id: consumer.id,
            });
        }
        records.consumers.push(consumer.clone());
        Ok(consumer)
    }

    async fn list_consumers(&self) -> Result<Vec<Consumer>> {
        Ok(self.records.read().await.consumers.clone())
    }

    async fn get_consumer(&self, id: &str) -> Result<Option<Consumer>> {
        let records = self.records.read().await;
        Ok(records.consumers.iter().find(|c| c.id == id).cloned())
    }

    async fn update_consumer(&self, id: &str, input: NewConsumer) -> Result<Consumer> {
        let mut records = self.records.write().await;
        if !records.producers.iter().any(|p| p.id == input.producer_id) {
            return Err(Error::ProducerNotFound {
                id: input.producer_id,
            });
        }
        let consumer = records
            .consumers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::ConsumerNotFound { id: id.to_string() })?;
        consumer.apply(input);
        Ok(consumer.clone())
    }

    async fn delete_consumer(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let before = records.consumers.len();
        records.consumers.retain(|c| c.id != id);
        Ok(records.consumers.len() != before)
    }

    async fn consumers_for_producer(&self, producer_id: &str) -> Result<Vec<Consumer>> {
        let records = self.records.read().await;
        Ok(records
            .consumers
            .iter()
            .filter(|c| c.producer_id == producer_id)
            .cloned()
            .collect())
    }

    async fn mark_triggered(&self, consumer_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut records = self.records.write().await;
        let consumer = records
            .consumers
            .iter_mut()
            .find(|c| c.id == consumer_id)
            .ok_or_else(|| Error::ConsumerNotFound {
                id: consumer_id.to_string(),
            })?;
        consumer.last_triggered = Some(at);
        Ok(())
    }

    async fn append_log(&self, entry: WebhookLog) -> Result<()> {
        self.logs.lock().await.push(entry);
        Ok(())
    }

    async fn logs_for_consumer(&self, consumer_id: &str) -> Result<Vec<WebhookLog>> {
        Ok(self.logs.lock().await.for_consumer(consumer_id))
    }

    async fn recent_logs(&self) -> Result<Vec<WebhookLog>> {
        Ok(self.logs.lock().await.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::ConsumerAttribute;
    use crate::log::DeliveryStatus;
    use crate::producer::{Attribute, AttributeType, Status};
    use serde_json::json;

    fn new_producer(id: &str) -> NewProducer {
        NewProducer {
            id: Some(id.to_string()),
            name: format!("Producer {id}"),
            description: None,
            attributes: vec![Attribute::new("userId", AttributeType::Int)],
            status: Status::Active,
        }
    }

    fn new_consumer(id: &str, producer_id: &str) -> NewConsumer {
        NewConsumer {
            id: Some(id.to_string()),
            producer_id: producer_id.to_string(),
            name: format!("Consumer {id}"),
            webhook_url: "https://hooks.example.com/in".to_string(),
            attributes: vec![ConsumerAttribute::direct(
                "id",
                AttributeType::Int,
                "userId",
            )],
            status: Status::Active,
        }
    }

    #[tokio::test]
    async fn test_producer_crud() {
        let store = MemoryStore::new();
        let created = store.create_producer(new_producer("p1")).await.unwrap();
        assert_eq!(created.endpoint, "/api/producers/p1");

        let mut edit = new_producer("ignored");
        edit.name = "Renamed".to_string();
        let updated = store.update_producer("p1", edit).await.unwrap();
        assert_eq!(updated.id, "p1");
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.created_at, created.created_at);

        assert_eq!(store.list_producers().await.unwrap().len(), 1);
        assert!(store.delete_producer("p1").await.unwrap());
        assert!(!store.delete_producer("p1").await.unwrap());
        assert!(store.get_producer("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generated_ids_are_unique() {
        let store = MemoryStore::new();
        let mut input = new_producer("");
        input.id = None;
        let a = store.create_producer(input.clone()).await.unwrap();
        let b = store.create_producer(input).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 32);
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let store = MemoryStore::new();
        store.create_producer(new_producer("p1")).await.unwrap();
        let err = store.create_producer(new_producer("p1")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { kind: "producer", .. }));
    }

    #[tokio::test]
    async fn test_consumer_requires_producer() {
        let store = MemoryStore::new();
        let err = store
            .create_consumer(new_consumer("c1", "missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProducerNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_producer_cascades() {
        let store = MemoryStore::new();
        store.create_producer(new_producer("p1")).await.unwrap();
        store.create_producer(new_producer("p2")).await.unwrap();
        store.create_consumer(new_consumer("c1", "p1")).await.unwrap();
        store.create_consumer(new_consumer("c2", "p1")).await.unwrap();
        store.create_consumer(new_consumer("c3", "p2")).await.unwrap();

        assert_eq!(store.consumers_for_producer("p1").await.unwrap().len(), 2);
        store.delete_producer("p1").await.unwrap();

        let remaining = store.list_consumers().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "c3");
    }

    #[tokio::test]
    async fn test_mark_triggered() {
        let store = MemoryStore::new();
        store.create_producer(new_producer("p1")).await.unwrap();
        store.create_consumer(new_consumer("c1", "p1")).await.unwrap();
        let now = Utc::now();
        store.mark_triggered("c1", now).await.unwrap();
        let consumer = store.get_consumer("c1").await.unwrap().unwrap();
        assert_eq!(consumer.last_triggered, Some(now));
        assert!(store.mark_triggered("nope", now).await.is_err());
    }

    #[tokio::test]
    async fn test_logs_capped_newest_first() {
        let store = MemoryStore::with_log_capacity(3);
        for n in 0..5 {
            let consumer = if n % 2 == 0 { "c1" } else { "c2" };
            store
                .append_log(WebhookLog::new(
                    consumer,
                    "p1",
                    DeliveryStatus::Success,
                    json!({ "n": n }),
                ))
                .await
                .unwrap();
        }
        let logs = store.recent_logs().await.unwrap();
        let ns: Vec<_> = logs.iter().map(|l| l.payload["n"].clone()).collect();
        assert_eq!(ns, vec![json!(4), json!(3), json!(2)]);

        let c1 = store.logs_for_consumer("c1").await.unwrap();
        assert_eq!(c1.len(), 2);
        assert_eq!(c1[0].payload["n"], 4);
    }
}
