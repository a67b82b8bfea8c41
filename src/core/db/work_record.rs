use std::collections::HashSet;
use std::future::Future;

use serde::Serialize;
use sqlx::{Row, sqlite::SqliteRow};

use crate::core::db::{
    error::{StoreError, ValidationError},
    util,
    work_state::WorkStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    Installation,
    Inspection,
    Maintenance,
    Repair,
}

impl WorkType {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkType::Installation => "installation",
            WorkType::Inspection => "inspection",
            WorkType::Maintenance => "maintenance",
            WorkType::Repair => "repair",
        }
    }
}

impl TryFrom<&str> for WorkType {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "installation" => Ok(WorkType::Installation),
            "inspection" => Ok(WorkType::Inspection),
            "maintenance" => Ok(WorkType::Maintenance),
            "repair" => Ok(WorkType::Repair),
            _ => Err(ValidationError::InvalidEnum {
                field: "work_type",
                value: value.to_string(),
            }),
        }
    }
}

/// One confirmed batch of work on one or more tables. Immutable once
/// created; the only writer of table work states.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkRecord {
    pub id: String,
    pub project_id: String,
    pub table_ids: Vec<String>,
    pub work_type: WorkType,
    pub status: WorkStatus,
    pub notes: Option<String>,
    pub worker_name: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip)]
    pub(super) _guard: (),
}

#[derive(Debug, Clone)]
pub struct NewWorkRecord {
    pub project_id: String,
    pub table_ids: Vec<String>,
    pub work_type: WorkType,
    pub status: WorkStatus,
    pub notes: Option<String>,
    pub worker_name: Option<String>,
    /// Defaults to now.
    pub started_at: Option<i64>,
    /// Defaults to now when `status` is completed, otherwise unset.
    pub completed_at: Option<i64>,
}

impl NewWorkRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.project_id.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "project_id" });
        }
        if self.table_ids.is_empty() {
            return Err(ValidationError::MissingField { field: "table_ids" });
        }
        let mut seen = HashSet::new();
        for id in &self.table_ids {
            if !seen.insert(id.as_str()) {
                return Err(ValidationError::OutOfRange {
                    field: "table_ids",
                    reason: format!("duplicate table id {id}"),
                });
            }
        }
        if let (Some(started), Some(completed)) = (self.started_at, self.completed_at) {
            if completed < started {
                return Err(ValidationError::OutOfRange {
                    field: "completed_at",
                    reason: format!("{completed} is before started_at {started}"),
                });
            }
        }
        Ok(())
    }
}

impl WorkRecord {
    pub(super) fn from_new(new: &NewWorkRecord) -> Result<Self, ValidationError> {
        new.validate()?;
        let now = util::epoch_ms();
        let completed_at = match (new.completed_at, new.status) {
            (Some(at), _) => Some(at),
            (None, WorkStatus::Completed) => Some(now),
            (None, _) => None,
        };
        Ok(WorkRecord {
            id: util::new_entity_id(),
            project_id: new.project_id.clone(),
            table_ids: new.table_ids.clone(),
            work_type: new.work_type,
            status: new.status,
            notes: new.notes.clone(),
            worker_name: new.worker_name.clone(),
            started_at: new.started_at.unwrap_or(now),
            completed_at,
            created_at: now,
            updated_at: now,
            _guard: (),
        })
    }
}

/// All filters are conjunctive; the time range is inclusive on both ends
/// and matches on `started_at`.
#[derive(Debug, Clone)]
pub struct WorkRecordFilter {
    pub project_id: Option<String>,
    pub work_type: Option<WorkType>,
    pub status: Option<WorkStatus>,
    pub started_after: Option<i64>,
    pub started_before: Option<i64>,
    pub offset: u32,
    pub limit: u32,
}

impl Default for WorkRecordFilter {
    fn default() -> Self {
        WorkRecordFilter {
            project_id: None,
            work_type: None,
            status: None,
            started_after: None,
            started_before: None,
            offset: 0,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkRecordPage {
    pub records: Vec<WorkRecord>,
    pub total: u64,
    pub has_more: bool,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for WorkRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let work_type: String = row.try_get("work_type")?;
        let work_type =
            WorkType::try_from(work_type.as_str()).map_err(|e| sqlx::Error::ColumnDecode {
                index: "work_type".to_string(),
                source: Box::new(e),
            })?;
        let status: String = row.try_get("status")?;
        let status =
            WorkStatus::try_from(status.as_str()).map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: Box::new(e),
            })?;
        let table_ids: String = row.try_get("table_ids")?;
        let table_ids: Vec<String> =
            serde_json::from_str(&table_ids).map_err(|e| sqlx::Error::ColumnDecode {
                index: "table_ids".to_string(),
                source: Box::new(e),
            })?;
        Ok(WorkRecord {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            table_ids,
            work_type,
            status,
            notes: row.try_get("notes")?,
            worker_name: row.try_get("worker_name")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            _guard: (),
        })
    }
}

pub trait WorkRecordRepository {
    /// The single write path for performed work: inserts the record and
    /// brings every referenced table's work state to the record's status in
    /// one transaction. A reader can never observe the record without its
    /// state updates.
    fn add_work_record(
        &self,
        new: &NewWorkRecord,
    ) -> impl Future<Output = Result<WorkRecord, StoreError>>;
    fn get_work_record(&self, id: &str) -> impl Future<Output = Result<WorkRecord, StoreError>>;
    /// Descending creation order with offset/limit pagination.
    fn list_work_records(
        &self,
        filter: &WorkRecordFilter,
    ) -> impl Future<Output = Result<WorkRecordPage, StoreError>>;
    /// Removes the history entry only; work states written by the record
    /// remain the persisted truth.
    fn delete_work_record(&self, id: &str) -> impl Future<Output = Result<(), StoreError>>;
}
