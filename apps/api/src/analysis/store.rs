use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Organizations,
    Applicants,
    Comparisons,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Organizations => "organizations",
            CollectionKind::Applicants => "applicants",
            CollectionKind::Comparisons => "comparisons",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence for finished records. Only fully formed records are saved.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stores a record and returns its storage id.
    async fn save(&self, kind: CollectionKind, subject: &str, record: &Value) -> Result<String, PipelineError>;

    /// Most recent record saved for `subject`, with `_id` filled in.
    async fn find(&self, kind: CollectionKind, subject: &str) -> Result<Option<Value>, PipelineError>;
}

/// JSONB-backed store over the `analysis_records` table (see `db::ensure_schema`).
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn persistence(e: sqlx::Error) -> PipelineError {
    PipelineError::Persistence(e.to_string())
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn save(&self, kind: CollectionKind, subject: &str, record: &Value) -> Result<String, PipelineError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO analysis_records (id, kind, subject_name, record) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(subject)
        .bind(record)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        info!("Saved {kind} record for '{subject}' ({id})");
        Ok(id.to_string())
    }

    async fn find(&self, kind: CollectionKind, subject: &str) -> Result<Option<Value>, PipelineError> {
        let row: Option<(Uuid, Value, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, record, created_at FROM analysis_records
            WHERE kind = $1 AND subject_name = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(kind.as_str())
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(row.map(|(id, record, created_at)| with_storage_fields(record, id, created_at)))
    }
}

/// Adds `_id` and `_created_at` to a stored object; other JSON is returned as is.
fn with_storage_fields(mut record: Value, id: Uuid, created_at: DateTime<Utc>) -> Value {
    if let Value::Object(map) = &mut record {
        map.insert("_id".to_string(), Value::String(id.to_string()));
        map.insert("_created_at".to_string(), Value::String(created_at.to_rfc3339()));
    }
    record
}
