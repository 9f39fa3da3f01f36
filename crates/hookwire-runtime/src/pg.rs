//! PostgreSQL store
//!
//! Records are kept as JSON documents in text columns, keyed by id. The
//! schema is applied from `migrations/` on connect. The log table is
//! trimmed to the configured capacity after every append; appends hold a
//! transaction-scoped advisory lock so concurrent writers trim in turn.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hookwire_core::{
    Consumer, Error as CoreError, NewConsumer, NewProducer, Producer, Result as CoreResult, Store,
    WebhookLog,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Row};

use crate::error::Result;

/// Advisory lock key serializing log appends
const LOG_APPEND_LOCK: i64 = 0x686f_6f6b_6c6f_6773;

/// Store backed by a PostgreSQL database
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    log_capacity: i64,
}

impl PgStore {
    /// Connect, apply migrations and retain at most `log_capacity` logs
    pub async fn connect(url: &str, log_capacity: usize) -> Result<Self> {
        tracing::debug!("connecting to database");
        let pool = PgPool::connect(url).await?;
        let store = Self::from_pool(pool, log_capacity);
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool without running migrations
    pub fn from_pool(pool: PgPool, log_capacity: usize) -> Self {
        Self {
            pool,
            log_capacity: i64::try_from(log_capacity.max(1)).unwrap_or(i64::MAX),
        }
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database schema up to date");
        Ok(())
    }

    /// The underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn producer_exists(&self, id: &str) -> CoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM producers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        Ok(row.is_some())
    }

    async fn save_producer(&self, producer: &Producer) -> CoreResult<()> {
        sqlx::query("UPDATE producers SET doc = $2 WHERE id = $1")
            .bind(&producer.id)
            .bind(encode(producer)?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(())
    }

    async fn save_consumer(&self, consumer: &Consumer) -> CoreResult<()> {
        sqlx::query("UPDATE consumers SET producer_id = $2, doc = $3 WHERE id = $1")
            .bind(&consumer.id)
            .bind(&consumer.producer_id)
            .bind(encode(consumer)?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(())
    }
}

fn db(e: sqlx::Error) -> CoreError {
    CoreError::Store(e.to_string())
}

fn encode<T: Serialize>(record: &T) -> CoreResult<String> {
    Ok(serde_json::to_string(record)?)
}

fn decode<T: DeserializeOwned>(row: &sqlx::postgres::PgRow) -> CoreResult<T> {
    let doc: String = row.try_get("doc").map_err(db)?;
    Ok(serde_json::from_str(&doc)?)
}

fn decode_all<T: DeserializeOwned>(rows: &[sqlx::postgres::PgRow]) -> CoreResult<Vec<T>> {
    rows.iter().map(decode).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn create_producer(&self, input: NewProducer) -> CoreResult<Producer> {
        let producer = Producer::create(input);
        let inserted =
            sqlx::query("INSERT INTO producers (id, doc) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(&producer.id)
                .bind(encode(&producer)?)
                .execute(&self.pool)
                .await
                .map_err(db)?;
        if inserted.rows_affected() == 0 {
            return Err(CoreError::Conflict {
                kind: "producer",
                id: producer.id,
            });
        }
        Ok(producer)
    }

    async fn list_producers(&self) -> CoreResult<Vec<Producer>> {
        let rows = sqlx::query("SELECT doc FROM producers ORDER BY position")
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        decode_all(&rows)
    }

    async fn get_producer(&self, id: &str) -> CoreResult<Option<Producer>> {
        let row = sqlx::query("SELECT doc FROM producers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(decode).transpose()
    }

    async fn update_producer(&self, id: &str, input: NewProducer) -> CoreResult<Producer> {
        let mut producer = self
            .get_producer(id)
            .await?
            .ok_or_else(|| CoreError::ProducerNotFound { id: id.to_string() })?;
        producer.apply(input);
        self.save_producer(&producer).await?;
        Ok(producer)
    }

    async fn delete_producer(&self, id: &str) -> CoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM producers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn create_consumer(&self, input: NewConsumer) -> CoreResult<Consumer> {
        let consumer = Consumer::create(input);
        if !self.producer_exists(&consumer.producer_id).await? {
            return Err(CoreError::ProducerNotFound {
                id: consumer.producer_id,
            });
        }
        let inserted = sqlx::query(
            "INSERT INTO consumers (id, producer_id, doc) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(&consumer.id)
        .bind(&consumer.producer_id)
        .bind(encode(&consumer)?)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if inserted.rows_affected() == 0 {
            return Err(CoreError::Conflict {
                kind: "consumer",
                id: consumer.id,
            });
        }
        Ok(consumer)
    }

    async fn list_consumers(&self) -> CoreResult<Vec<Consumer>> {
        let rows = sqlx::query("SELECT doc FROM consumers ORDER BY position")
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        decode_all(&rows)
    }

    async fn get_consumer(&self, id: &str) -> CoreResult<Option<Consumer>> {
        let row = sqlx::query("SELECT doc FROM consumers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(decode).transpose()
    }

    async fn update_consumer(&self, id: &str, input: NewConsumer) -> CoreResult<Consumer> {
        if !self.producer_exists(&input.producer_id).await? {
            return Err(CoreError::ProducerNotFound {
                id: input.producer_id,
            });
        }
        let mut consumer = self
            .get_consumer(id)
            .await?
            .ok_or_else(|| CoreError::ConsumerNotFound { id: id.to_string() })?;
        consumer.apply(input);
        self.save_consumer(&consumer).await?;
        Ok(consumer)
    }

    async fn delete_consumer(&self, id: &str) -> CoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM consumers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn consumers_for_producer(&self, producer_id: &str) -> CoreResult<Vec<Consumer>> {
        let rows = sqlx::query("SELECT doc FROM consumers WHERE producer_id = $1 ORDER BY position")
            .bind(producer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        decode_all(&rows)
    }

    async fn mark_triggered(&self, consumer_id: &str, at: DateTime<Utc>) -> CoreResult<()> {
        let mut consumer =
            self.get_consumer(consumer_id)
                .await?
                .ok_or_else(|| CoreError::ConsumerNotFound {
                    id: consumer_id.to_string(),
                })?;
        consumer.last_triggered = Some(at);
        self.save_consumer(&consumer).await
    }

    async fn append_log(&self, entry: WebhookLog) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(LOG_APPEND_LOCK)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        sqlx::query("INSERT INTO webhook_logs (consumer_id, doc) VALUES ($1, $2)")
            .bind(&entry.consumer_id)
            .bind(encode(&entry)?)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        sqlx::query(
            "DELETE FROM webhook_logs WHERE seq NOT IN \
             (SELECT seq FROM webhook_logs ORDER BY seq DESC LIMIT $1)",
        )
        .bind(self.log_capacity)
        .execute(&mut *tx)
        .await
        .map_err(db)?;
        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn logs_for_consumer(&self, consumer_id: &str) -> CoreResult<Vec<WebhookLog>> {
        let rows =
            sqlx::query("SELECT doc FROM webhook_logs WHERE consumer_id = $1 ORDER BY seq DESC")
                .bind(consumer_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;
        decode_all(&rows)
    }

    async fn recent_logs(&self) -> CoreResult<Vec<WebhookLog>> {
        let rows = sqlx::query("SELECT doc FROM webhook_logs ORDER BY seq DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        decode_all(&rows)
    }
}
