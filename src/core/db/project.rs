use std::future::Future;

use serde::Serialize;
use sqlx::{Row, sqlite::SqliteRow};

use crate::calc::ProjectStatistics;
use crate::core::db::{
    error::{StoreError, ValidationError},
    model::GridConfig,
    util,
};

/// Upper bound on grid rows/columns accepted at project creation.
pub const MAX_GRID_DIM: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Active,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Archived => "archived",
        }
    }
}

impl TryFrom<&str> for ProjectStatus {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "draft" => Ok(ProjectStatus::Draft),
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            "archived" => Ok(ProjectStatus::Archived),
            _ => Err(ValidationError::InvalidEnum {
                field: "status",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: ProjectStatus,
    pub grid: GridConfig,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip)]
    pub(super) _guard: (),
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub grid: GridConfig,
}

impl NewProject {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "name" });
        }
        for (field, dim) in [("grid_rows", self.grid.rows), ("grid_columns", self.grid.columns)] {
            if dim == 0 || dim > MAX_GRID_DIM {
                return Err(ValidationError::OutOfRange {
                    field,
                    reason: format!("{dim} is outside 1..={MAX_GRID_DIM}"),
                });
            }
        }
        Ok(())
    }
}

impl Project {
    /// Validate a create DTO and stamp id and timestamps. New projects start
    /// in `draft`.
    pub(super) fn from_new(new: &NewProject) -> Result<Self, ValidationError> {
        new.validate()?;
        let now = util::epoch_ms();
        Ok(Project {
            id: util::new_entity_id(),
            name: new.name.trim().to_string(),
            description: new.description.clone(),
            location: new.location.clone(),
            status: ProjectStatus::Draft,
            grid: new.grid,
            created_at: now,
            updated_at: now,
            _guard: (),
        })
    }
}

/// Inner `Option` clears the column, outer `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for Project {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status =
            ProjectStatus::try_from(status.as_str()).map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: Box::new(e),
            })?;
        Ok(Project {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            location: row.try_get("location")?,
            status,
            grid: GridConfig {
                rows: row
                    .try_get::<i64, _>("grid_rows")?
                    .try_into()
                    .expect("grid dimension bounded by validation"),
                columns: row
                    .try_get::<i64, _>("grid_columns")?
                    .try_into()
                    .expect("grid dimension bounded by validation"),
            },
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            _guard: (),
        })
    }
}

pub trait ProjectRepository {
    fn add_project(&self, new: &NewProject)
    -> impl Future<Output = Result<Project, StoreError>>;
    fn get_project(&self, id: &str) -> impl Future<Output = Result<Project, StoreError>>;
    fn get_projects(
        &self,
        offset: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Project>, StoreError>>;
    fn count_projects(&self) -> impl Future<Output = Result<u64, StoreError>>;
    fn project_exists(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>>;
    fn update_project(
        &self,
        id: &str,
        update: &ProjectUpdate,
    ) -> impl Future<Output = Result<Project, StoreError>>;
    /// Delete the project together with its tables, their work states and its
    /// work records in a single transaction. All-or-nothing.
    fn delete_project_with_related(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<(), StoreError>>;
    fn project_statistics(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ProjectStatistics, StoreError>>;
}
