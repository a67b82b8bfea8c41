use std::future::Future;

use serde::Serialize;
use sqlx::{Row, sqlite::SqliteRow};

use crate::core::db::error::{StoreError, ValidationError};

/// Items that have failed this many delivery attempts are dead: excluded
/// from `get_pending` until an operator calls `reset_all_attempts`.
pub const MAX_SYNC_ATTEMPTS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

impl SyncOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncOperation::Create => "create",
            SyncOperation::Update => "update",
            SyncOperation::Delete => "delete",
        }
    }
}

impl TryFrom<&str> for SyncOperation {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "create" => Ok(SyncOperation::Create),
            "update" => Ok(SyncOperation::Update),
            "delete" => Ok(SyncOperation::Delete),
            _ => Err(ValidationError::InvalidEnum {
                field: "op",
                value: value.to_string(),
            }),
        }
    }
}

/// Entity kinds the remote backend knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEntity {
    Project,
    Table,
    WorkState,
    WorkRecord,
}

impl SyncEntity {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncEntity::Project => "project",
            SyncEntity::Table => "table",
            SyncEntity::WorkState => "work_state",
            SyncEntity::WorkRecord => "work_record",
        }
    }
}

impl TryFrom<&str> for SyncEntity {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "project" => Ok(SyncEntity::Project),
            "table" => Ok(SyncEntity::Table),
            "work_state" => Ok(SyncEntity::WorkState),
            "work_record" => Ok(SyncEntity::WorkRecord),
            _ => Err(ValidationError::InvalidEnum {
                field: "entity_type",
                value: value.to_string(),
            }),
        }
    }
}

/// One queued remote mutation. The payload is an opaque blob for the sync
/// driver; the core never interprets it after enqueue.
#[derive(Debug, Clone)]
pub struct SyncQueueItem {
    pub id: i64,
    pub entity_type: SyncEntity,
    pub entity_id: String,
    pub op: SyncOperation,
    pub payload: Option<serde_json::Value>,
    pub created_at: i64,
    pub attempts: i64,
    pub last_attempt_at: Option<i64>,
    pub error: Option<String>,
    pub(super) _guard: (),
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for SyncQueueItem {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let entity_type: String = row.try_get("entity_type")?;
        let entity_type =
            SyncEntity::try_from(entity_type.as_str()).map_err(|e| sqlx::Error::ColumnDecode {
                index: "entity_type".to_string(),
                source: Box::new(e),
            })?;
        let op: String = row.try_get("op")?;
        let op = SyncOperation::try_from(op.as_str()).map_err(|e| sqlx::Error::ColumnDecode {
            index: "op".to_string(),
            source: Box::new(e),
        })?;
        let payload: Option<String> = row.try_get("payload")?;
        let payload = payload
            .map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "payload".to_string(),
                source: Box::new(e),
            })?;
        Ok(SyncQueueItem {
            id: row.try_get("id")?,
            entity_type,
            entity_id: row.try_get("entity_id")?,
            op,
            payload,
            created_at: row.try_get("created_at")?,
            attempts: row.try_get("attempts")?,
            last_attempt_at: row.try_get("last_attempt_at")?,
            error: row.try_get("error")?,
            _guard: (),
        })
    }
}

/// The outbox of unsynced local mutations. Local writes never depend on the
/// network; the external sync driver drains `get_pending` and reports back
/// through `mark_completed`/`mark_failed`.
pub trait SyncQueueRepository {
    fn enqueue(
        &self,
        entity_type: SyncEntity,
        entity_id: &str,
        op: SyncOperation,
        payload: Option<serde_json::Value>,
    ) -> impl Future<Output = Result<i64, StoreError>>;
    /// Items still worth attempting, FIFO by id.
    fn get_pending(&self, limit: u32)
    -> impl Future<Output = Result<Vec<SyncQueueItem>, StoreError>>;
    /// Dead items held for operator inspection.
    fn get_failed(&self) -> impl Future<Output = Result<Vec<SyncQueueItem>, StoreError>>;
    /// Delivery succeeded; the row is deleted.
    fn mark_completed(&self, id: i64) -> impl Future<Output = Result<(), StoreError>>;
    /// Delivery failed; bumps attempts and records the error verbatim.
    fn mark_failed(
        &self,
        id: i64,
        error: &str,
    ) -> impl Future<Output = Result<(), StoreError>>;
    /// Manual recovery only: reopens every item, dead ones included.
    fn reset_all_attempts(&self) -> impl Future<Output = Result<u64, StoreError>>;
    /// Purge queued mutations for an entity deleted locally before it was
    /// ever synced.
    fn remove_by_entity(
        &self,
        entity_type: SyncEntity,
        entity_id: &str,
    ) -> impl Future<Output = Result<u64, StoreError>>;
}
