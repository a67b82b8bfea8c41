use std::future::Future;

use serde::Serialize;
use sqlx::{Row, sqlite::SqliteRow};

use crate::core::db::{
    error::{StoreError, ValidationError},
    model::GridPosition,
    util,
    work_state::TableWorkState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSize {
    Small,
    Medium,
    Large,
}

impl TableSize {
    pub fn as_str(self) -> &'static str {
        match self {
            TableSize::Small => "small",
            TableSize::Medium => "medium",
            TableSize::Large => "large",
        }
    }
}

impl TryFrom<&str> for TableSize {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "small" => Ok(TableSize::Small),
            "medium" => Ok(TableSize::Medium),
            "large" => Ok(TableSize::Large),
            _ => Err(ValidationError::InvalidEnum {
                field: "size",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub project_id: String,
    pub position: GridPosition,
    pub size: TableSize,
    pub label: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip)]
    pub(super) _guard: (),
}

#[derive(Debug, Clone)]
pub struct NewTable {
    pub project_id: String,
    pub position: GridPosition,
    pub size: TableSize,
    pub label: Option<String>,
}

impl NewTable {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.project_id.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "project_id" });
        }
        Ok(())
    }
}

impl Table {
    pub(super) fn from_new(new: &NewTable) -> Result<Self, ValidationError> {
        new.validate()?;
        let now = util::epoch_ms();
        Ok(Table {
            id: util::new_entity_id(),
            project_id: new.project_id.clone(),
            position: new.position,
            size: new.size,
            label: new.label.clone(),
            created_at: now,
            updated_at: now,
            _guard: (),
        })
    }
}

/// Position is fixed after creation; only size and label are mutable.
/// Inner `Option` clears the label, outer `None` keeps it.
#[derive(Debug, Clone, Default)]
pub struct TableUpdate {
    pub size: Option<TableSize>,
    pub label: Option<Option<String>>,
}

/// A table joined with its work state. Tables without a stored state row
/// carry the substituted pending default, never a hole.
#[derive(Debug, Clone)]
pub struct TableWithWorkState {
    pub table: Table,
    pub work_state: TableWorkState,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for Table {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let size: String = row.try_get("size")?;
        let size = TableSize::try_from(size.as_str()).map_err(|e| sqlx::Error::ColumnDecode {
            index: "size".to_string(),
            source: Box::new(e),
        })?;
        Ok(Table {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            position: GridPosition {
                row: row
                    .try_get::<i64, _>("grid_row")?
                    .try_into()
                    .expect("grid coordinate bounded by validation"),
                column: row
                    .try_get::<i64, _>("grid_col")?
                    .try_into()
                    .expect("grid coordinate bounded by validation"),
            },
            size,
            label: row.try_get("label")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            _guard: (),
        })
    }
}

pub trait TableRepository {
    /// Insert the table and its default pending work state in one
    /// transaction.
    fn add_table(&self, new: &NewTable) -> impl Future<Output = Result<Table, StoreError>>;
    /// Validate every DTO before writing any; one invalid entry fails the
    /// whole batch with zero rows written.
    fn add_tables(&self, new: &[NewTable]) -> impl Future<Output = Result<Vec<Table>, StoreError>>;
    fn get_table(&self, id: &str) -> impl Future<Output = Result<Table, StoreError>>;
    fn get_table_at(
        &self,
        project_id: &str,
        position: GridPosition,
    ) -> impl Future<Output = Result<Option<Table>, StoreError>>;
    fn get_tables(&self, project_id: &str)
    -> impl Future<Output = Result<Vec<Table>, StoreError>>;
    fn get_tables_with_work_state(
        &self,
        project_id: &str,
    ) -> impl Future<Output = Result<Vec<TableWithWorkState>, StoreError>>;
    fn update_table(
        &self,
        id: &str,
        update: &TableUpdate,
    ) -> impl Future<Output = Result<Table, StoreError>>;
    fn delete_table(&self, id: &str) -> impl Future<Output = Result<(), StoreError>>;
    fn delete_tables(&self, ids: &[String]) -> impl Future<Output = Result<(), StoreError>>;
    fn count_tables(&self, project_id: &str) -> impl Future<Output = Result<u64, StoreError>>;
    fn table_exists(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>>;
}
