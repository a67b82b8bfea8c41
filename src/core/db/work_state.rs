use std::future::Future;

use serde::Serialize;
use sqlx::{Row, sqlite::SqliteRow};

use crate::core::db::{
    error::{StoreError, ValidationError},
    util,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl WorkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkStatus::Pending => "pending",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::Completed => "completed",
            WorkStatus::Skipped => "skipped",
        }
    }
}

impl TryFrom<&str> for WorkStatus {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(WorkStatus::Pending),
            "in_progress" => Ok(WorkStatus::InProgress),
            "completed" => Ok(WorkStatus::Completed),
            "skipped" => Ok(WorkStatus::Skipped),
            _ => Err(ValidationError::InvalidEnum {
                field: "status",
                value: value.to_string(),
            }),
        }
    }
}

/// Installation progress of one table. Stored apart from the table row so
/// frequent status writes never touch the table record. A missing row means
/// `pending`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableWorkState {
    pub table_id: String,
    pub project_id: String,
    pub status: WorkStatus,
    pub last_work_record_id: Option<String>,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
    #[serde(skip)]
    pub(super) _guard: (),
}

impl TableWorkState {
    /// The sentinel substituted wherever a table has no stored state row.
    /// Every join and count site goes through here so the default cannot
    /// diverge.
    pub fn default_pending(table_id: &str, project_id: &str) -> Self {
        TableWorkState {
            table_id: table_id.to_string(),
            project_id: project_id.to_string(),
            status: WorkStatus::Pending,
            last_work_record_id: None,
            completed_at: None,
            updated_at: util::epoch_ms(),
            _guard: (),
        }
    }
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for TableWorkState {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status =
            WorkStatus::try_from(status.as_str()).map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: Box::new(e),
            })?;
        Ok(TableWorkState {
            table_id: row.try_get("table_id")?,
            project_id: row.try_get("project_id")?,
            status,
            last_work_record_id: row.try_get("last_work_record_id")?,
            completed_at: row.try_get("completed_at")?,
            updated_at: row.try_get("updated_at")?,
            _guard: (),
        })
    }
}

/// Per-status table counts for one project. Tables without a state row are
/// counted as pending, so the totals always cover every table exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub skipped: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.in_progress + self.completed + self.skipped
    }

    pub(crate) fn bump(&mut self, status: WorkStatus) {
        match status {
            WorkStatus::Pending => self.pending += 1,
            WorkStatus::InProgress => self.in_progress += 1,
            WorkStatus::Completed => self.completed += 1,
            WorkStatus::Skipped => self.skipped += 1,
        }
    }
}

pub trait WorkStateRepository {
    /// The raw stored row, if any. Most callers want the substituted view
    /// from `get_tables_with_work_state` instead.
    fn get_work_state(
        &self,
        table_id: &str,
    ) -> impl Future<Output = Result<Option<TableWorkState>, StoreError>>;
    /// Explicit status upsert for one table, outside any work record.
    fn set_work_status(
        &self,
        table_id: &str,
        status: WorkStatus,
    ) -> impl Future<Output = Result<TableWorkState, StoreError>>;
    /// Bulk-upsert completed state with `completed_at = now` for every id,
    /// in one transaction.
    fn mark_as_completed(
        &self,
        table_ids: &[String],
        work_record_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>>;
    fn count_by_status(
        &self,
        project_id: &str,
    ) -> impl Future<Output = Result<StatusCounts, StoreError>>;
}
