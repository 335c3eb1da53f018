//! Profile sink
//!
//! Destination store contract: durable upsert keyed by profile id,
//! idempotent so redelivery after a crash-and-restart is harmless. The
//! Postgres implementation stores the whole normalized record as JSONB next
//! to its key; tests use the in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use harvester_common::{HarvestError, Result};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::api::types::NormalizedRecord;

/// Maximum connections in the sink's connection pool.
const SINK_MAX_CONNECTIONS: u32 = 10;

/// Destination store accepting idempotent keyed upserts
#[async_trait]
pub trait ProfileSink: Send + Sync {
    /// Durably upsert one record, keyed by profile id. Upserting the same
    /// record twice must leave the same observable state as upserting once.
    async fn upsert(&self, record: &NormalizedRecord) -> Result<()>;
}

/// Postgres-backed sink
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    /// Connect to the destination database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(SINK_MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| HarvestError::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create the profiles table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id BIGINT PRIMARY KEY,
                payload JSONB NOT NULL,
                ingested_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HarvestError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ProfileSink for PostgresSink {
    async fn upsert(&self, record: &NormalizedRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, payload)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
            SET payload = EXCLUDED.payload,
                ingested_at = NOW()
            "#,
        )
        .bind(record.profile_id)
        .bind(&record.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| HarvestError::Database(e.to_string()))?;

        Ok(())
    }
}

/// In-memory sink used by tests
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<HashMap<i64, Value>>,
    upserts: AtomicU64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored payload for one profile id.
    pub fn get(&self, profile_id: i64) -> Option<Value> {
        self.records
            .lock()
            .ok()
            .and_then(|r| r.get(&profile_id).cloned())
    }

    /// Total upsert calls, including overwrites.
    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ProfileSink for MemorySink {
    async fn upsert(&self, record: &NormalizedRecord) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::Relaxed);
        self.records
            .lock()
            .map_err(|_| HarvestError::Database("sink mutex poisoned".to_string()))?
            .insert(record.profile_id, record.payload.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: i64, payload: Value) -> NormalizedRecord {
        NormalizedRecord {
            profile_id: id,
            payload,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let sink = MemorySink::new();
        let rec = record(1, json!({"id": 1, "region": "EMEA"}));

        sink.upsert(&rec).await.unwrap();
        let after_one = sink.get(1);

        sink.upsert(&rec).await.unwrap();
        let after_two = sink.get(1);

        assert_eq!(after_one, after_two);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.upsert_count(), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_key() {
        let sink = MemorySink::new();
        sink.upsert(&record(1, json!({"v": 1}))).await.unwrap();
        sink.upsert(&record(1, json!({"v": 2}))).await.unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.get(1), Some(json!({"v": 2})));
    }
}
