mod error;
mod model;
mod project;
mod settings;
mod state;
mod sync_queue;
mod table;
mod util;
mod work_record;
mod work_state;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use sqlx::{FromRow, Row, Sqlite, Transaction, sqlite::SqliteRow};

use crate::calc::{self, ProjectStatistics};
use state::StoreState;

pub use error::{StoreError, ValidationError};
pub use model::{GridConfig, GridPosition};
pub use project::{
    MAX_GRID_DIM, NewProject, Project, ProjectRepository, ProjectStatus, ProjectUpdate,
};
pub use settings::{SettingsRepository, keys as setting_keys};
pub use sync_queue::{
    MAX_SYNC_ATTEMPTS, SyncEntity, SyncOperation, SyncQueueItem, SyncQueueRepository,
};
pub use table::{NewTable, Table, TableRepository, TableSize, TableUpdate, TableWithWorkState};
pub use work_record::{
    NewWorkRecord, WorkRecord, WorkRecordFilter, WorkRecordPage, WorkRecordRepository, WorkType,
};
pub use work_state::{StatusCounts, TableWorkState, WorkStateRepository, WorkStatus};

/// Handle to one on-device store. Cheap to clone; all clones share the
/// connection pool. Every mutation goes through the repository traits
/// implemented on this type, never through raw store access.
#[derive(Debug, Clone)]
pub struct StoreDb {
    state: Arc<StoreState>,
}

impl StoreDb {
    pub async fn new<P: AsRef<Path>>(store_file: P) -> Result<Self, StoreError> {
        Ok(Self {
            state: Arc::new(StoreState::new(store_file).await?),
        })
    }

    /// Checkpoint the WAL and release all connections. Required before the
    /// store file is copied or the process exits in an async context.
    pub async fn close(&self) -> Result<(), StoreError> {
        self.state.close().await
    }
}

fn json_payload<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    match serde_json::to_value(value) {
        Ok(payload) => Some(payload),
        Err(err) => {
            tracing::warn!(%err, "failed to serialize sync payload");
            None
        }
    }
}

/// Record a pending remote mutation inside the caller's transaction.
/// Fire-and-forget: an enqueue failure is logged and never fails the local
/// write that triggered it.
async fn enqueue_tx(
    tx: &mut Transaction<'static, Sqlite>,
    entity_type: SyncEntity,
    entity_id: &str,
    op: SyncOperation,
    payload: Option<serde_json::Value>,
) {
    let payload_text = payload.map(|p| p.to_string());
    let result = sqlx::query(
        r#"INSERT INTO sync_queue (entity_type, entity_id, op, payload, created_at)
        VALUES ($1, $2, $3, $4, $5)"#,
    )
    .bind(entity_type.as_str())
    .bind(entity_id)
    .bind(op.as_str())
    .bind(payload_text)
    .bind(util::epoch_ms())
    .execute(&mut **tx)
    .await;
    if let Err(err) = result {
        tracing::warn!(
            entity_type = entity_type.as_str(),
            entity_id,
            op = op.as_str(),
            %err,
            "failed to enqueue sync mutation"
        );
    }
}

/// Purge queued mutations for a locally deleted entity, then enqueue the
/// delete op unless the entity had an unsynced create (the remote never saw
/// it, so there is nothing to delete there). Best-effort, like `enqueue_tx`.
async fn purge_and_enqueue_delete_tx(
    tx: &mut Transaction<'static, Sqlite>,
    entity_type: SyncEntity,
    entity_id: &str,
) {
    let unsynced_create: i64 = match sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM sync_queue
        WHERE entity_type = $1 AND entity_id = $2 AND op = 'create'"#,
    )
    .bind(entity_type.as_str())
    .bind(entity_id)
    .fetch_one(&mut **tx)
    .await
    {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!(entity_id, %err, "failed to inspect sync queue before delete");
            0
        }
    };
    if let Err(err) = sqlx::query("DELETE FROM sync_queue WHERE entity_type = $1 AND entity_id = $2")
        .bind(entity_type.as_str())
        .bind(entity_id)
        .execute(&mut **tx)
        .await
    {
        tracing::warn!(entity_id, %err, "failed to purge sync queue for deleted entity");
    }
    if unsynced_create == 0 {
        enqueue_tx(tx, entity_type, entity_id, SyncOperation::Delete, None).await;
    }
}

/// Insert a table and its default pending work state, and queue both for
/// sync, inside the caller's transaction.
async fn insert_table_tx(
    tx: &mut Transaction<'static, Sqlite>,
    new: &NewTable,
    grid: GridConfig,
) -> Result<Table, StoreError> {
    if !grid.contains(&new.position) {
        return Err(ValidationError::OutOfRange {
            field: "position",
            reason: format!(
                "({}, {}) lies outside the {}x{} grid",
                new.position.row, new.position.column, grid.rows, grid.columns
            ),
        }
        .into());
    }
    let table = Table::from_new(new)?;
    sqlx::query(
        r#"INSERT INTO grid_table
        (id, project_id, grid_row, grid_col, size, label, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
    )
    .bind(&table.id)
    .bind(&table.project_id)
    .bind(table.position.row as i64)
    .bind(table.position.column as i64)
    .bind(table.size.as_str())
    .bind(&table.label)
    .bind(table.created_at)
    .bind(table.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| StoreError::from_insert("table", e))?;

    let work_state = TableWorkState::default_pending(&table.id, &table.project_id);
    sqlx::query(
        r#"INSERT INTO table_work_state
        (table_id, project_id, status, last_work_record_id, completed_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)"#,
    )
    .bind(&work_state.table_id)
    .bind(&work_state.project_id)
    .bind(work_state.status.as_str())
    .bind(&work_state.last_work_record_id)
    .bind(work_state.completed_at)
    .bind(work_state.updated_at)
    .execute(&mut **tx)
    .await?;

    enqueue_tx(
        tx,
        SyncEntity::Table,
        &table.id,
        SyncOperation::Create,
        json_payload(&table),
    )
    .await;
    enqueue_tx(
        tx,
        SyncEntity::WorkState,
        &work_state.table_id,
        SyncOperation::Create,
        json_payload(&work_state),
    )
    .await;
    Ok(table)
}

async fn delete_table_tx(
    tx: &mut Transaction<'static, Sqlite>,
    id: &str,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM table_work_state WHERE table_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    let result = sqlx::query("DELETE FROM grid_table WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("table", id));
    }
    purge_and_enqueue_delete_tx(tx, SyncEntity::WorkState, id).await;
    purge_and_enqueue_delete_tx(tx, SyncEntity::Table, id).await;
    Ok(())
}

/// Upsert one table's work state from a work record inside the caller's
/// transaction. Returns the stored state; `None` means the table is gone.
async fn upsert_work_state_tx(
    tx: &mut Transaction<'static, Sqlite>,
    table_id: &str,
    status: WorkStatus,
    work_record_id: &str,
    completed_at: Option<i64>,
    now: i64,
) -> Result<Option<TableWorkState>, StoreError> {
    let state = sqlx::query_as::<_, TableWorkState>(
        r#"INSERT INTO table_work_state
        (table_id, project_id, status, last_work_record_id, completed_at, updated_at)
        SELECT id, project_id, $2, $3, $4, $5 FROM grid_table WHERE id = $1
        ON CONFLICT (table_id) DO UPDATE SET
            status = excluded.status,
            last_work_record_id = excluded.last_work_record_id,
            completed_at = excluded.completed_at,
            updated_at = excluded.updated_at
        RETURNING table_id, project_id, status, last_work_record_id, completed_at, updated_at"#,
    )
    .bind(table_id)
    .bind(status.as_str())
    .bind(work_record_id)
    .bind(completed_at)
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(state)
}

fn table_with_state_from_row(row: &SqliteRow) -> Result<TableWithWorkState, StoreError> {
    let table = Table::from_row(row)?;
    let status: Option<String> = row.try_get("ws_status")?;
    let work_state = match status {
        None => TableWorkState::default_pending(&table.id, &table.project_id),
        Some(status) => {
            let status = WorkStatus::try_from(status.as_str())
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            TableWorkState {
                table_id: table.id.clone(),
                project_id: table.project_id.clone(),
                status,
                last_work_record_id: row.try_get("ws_last_work_record_id")?,
                completed_at: row.try_get("ws_completed_at")?,
                updated_at: row.try_get("ws_updated_at")?,
                _guard: (),
            }
        }
    };
    Ok(TableWithWorkState { table, work_state })
}

impl ProjectRepository for StoreDb {
    async fn add_project(&self, new: &NewProject) -> Result<Project, StoreError> {
        let project = Project::from_new(new)?;
        let mut tx = self.state.begin().await?;
        sqlx::query(
            r#"INSERT INTO project
            (id, name, description, location, status, grid_rows, grid_columns, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.location)
        .bind(project.status.as_str())
        .bind(project.grid.rows as i64)
        .bind(project.grid.columns as i64)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::from_insert("project", e))?;
        enqueue_tx(
            &mut tx,
            SyncEntity::Project,
            &project.id,
            SyncOperation::Create,
            json_payload(&project),
        )
        .await;
        tx.commit().await?;
        Ok(project)
    }

    async fn get_project(&self, id: &str) -> Result<Project, StoreError> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, Project>(
            r#"SELECT id, name, description, location, status, grid_rows, grid_columns,
                created_at, updated_at
            FROM project WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::not_found("project", id))
    }

    async fn get_projects(&self, offset: u32, limit: u32) -> Result<Vec<Project>, StoreError> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, Project>(
            r#"SELECT id, name, description, location, status, grid_rows, grid_columns,
                created_at, updated_at
            FROM project
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2"#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&mut *conn)
        .await?)
    }

    async fn count_projects(&self) -> Result<u64, StoreError> {
        let mut conn = self.state.conn().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count as u64)
    }

    async fn project_exists(&self, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.state.conn().await?;
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM project WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists != 0)
    }

    async fn update_project(&self, id: &str, update: &ProjectUpdate) -> Result<Project, StoreError> {
        let mut tx = self.state.begin().await?;
        let current = sqlx::query_as::<_, Project>(
            r#"SELECT id, name, description, location, status, grid_rows, grid_columns,
                created_at, updated_at
            FROM project WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("project", id))?;

        let name = update.name.clone().unwrap_or(current.name);
        let description = match &update.description {
            Some(value) => value.clone(),
            None => current.description,
        };
        let location = match &update.location {
            Some(value) => value.clone(),
            None => current.location,
        };
        let status = update.status.unwrap_or(current.status);
        let project = sqlx::query_as::<_, Project>(
            r#"UPDATE project SET
                name = $1,
                description = $2,
                location = $3,
                status = $4,
                updated_at = $5
            WHERE id = $6
            RETURNING id, name, description, location, status, grid_rows, grid_columns,
                created_at, updated_at"#,
        )
        .bind(&name)
        .bind(&description)
        .bind(&location)
        .bind(status.as_str())
        .bind(util::epoch_ms())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        enqueue_tx(
            &mut tx,
            SyncEntity::Project,
            id,
            SyncOperation::Update,
            json_payload(&project),
        )
        .await;
        tx.commit().await?;
        Ok(project)
    }

    async fn delete_project_with_related(&self, id: &str) -> Result<(), StoreError> {
        let mut tx = self.state.begin().await?;
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM project WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(StoreError::not_found("project", id));
        }
        let table_ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM grid_table WHERE project_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        let record_ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM work_record WHERE project_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM table_work_state WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM grid_table WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM work_record WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM project WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for table_id in &table_ids {
            purge_and_enqueue_delete_tx(&mut tx, SyncEntity::WorkState, table_id).await;
            purge_and_enqueue_delete_tx(&mut tx, SyncEntity::Table, table_id).await;
        }
        for record_id in &record_ids {
            purge_and_enqueue_delete_tx(&mut tx, SyncEntity::WorkRecord, record_id).await;
        }
        purge_and_enqueue_delete_tx(&mut tx, SyncEntity::Project, id).await;
        tx.commit().await?;
        Ok(())
    }

    async fn project_statistics(&self, id: &str) -> Result<ProjectStatistics, StoreError> {
        let project = self.get_project(id).await?;
        let rows = self.get_tables_with_work_state(&project.id).await?;
        Ok(calc::project_statistics(&rows))
    }
}

impl TableRepository for StoreDb {
    async fn add_table(&self, new: &NewTable) -> Result<Table, StoreError> {
        new.validate()?;
        let mut tx = self.state.begin().await?;
        let project = sqlx::query_as::<_, Project>(
            r#"SELECT id, name, description, location, status, grid_rows, grid_columns,
                created_at, updated_at
            FROM project WHERE id = $1"#,
        )
        .bind(&new.project_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("project", new.project_id.as_str()))?;
        let table = insert_table_tx(&mut tx, new, project.grid).await?;
        tx.commit().await?;
        Ok(table)
    }

    async fn add_tables(&self, new: &[NewTable]) -> Result<Vec<Table>, StoreError> {
        for entry in new {
            entry.validate()?;
        }
        let mut tx = self.state.begin().await?;
        let mut grids: HashMap<String, GridConfig> = HashMap::new();
        let mut created = Vec::with_capacity(new.len());
        for entry in new {
            let grid = match grids.get(&entry.project_id) {
                Some(grid) => *grid,
                None => {
                    let project = sqlx::query_as::<_, Project>(
                        r#"SELECT id, name, description, location, status, grid_rows,
                            grid_columns, created_at, updated_at
                        FROM project WHERE id = $1"#,
                    )
                    .bind(&entry.project_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| StoreError::not_found("project", entry.project_id.as_str()))?;
                    grids.insert(entry.project_id.clone(), project.grid);
                    project.grid
                }
            };
            let table = insert_table_tx(&mut tx, entry, grid).await?;
            created.push(table);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn get_table(&self, id: &str) -> Result<Table, StoreError> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, Table>(
            r#"SELECT id, project_id, grid_row, grid_col, size, label, created_at, updated_at
            FROM grid_table WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::not_found("table", id))
    }

    async fn get_table_at(
        &self,
        project_id: &str,
        position: GridPosition,
    ) -> Result<Option<Table>, StoreError> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, Table>(
            r#"SELECT id, project_id, grid_row, grid_col, size, label, created_at, updated_at
            FROM grid_table
            WHERE project_id = $1 AND grid_row = $2 AND grid_col = $3"#,
        )
        .bind(project_id)
        .bind(position.row as i64)
        .bind(position.column as i64)
        .fetch_optional(&mut *conn)
        .await?)
    }

    async fn get_tables(&self, project_id: &str) -> Result<Vec<Table>, StoreError> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, Table>(
            r#"SELECT id, project_id, grid_row, grid_col, size, label, created_at, updated_at
            FROM grid_table
            WHERE project_id = $1
            ORDER BY grid_row ASC, grid_col ASC"#,
        )
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    async fn get_tables_with_work_state(
        &self,
        project_id: &str,
    ) -> Result<Vec<TableWithWorkState>, StoreError> {
        let mut conn = self.state.conn().await?;
        let rows = sqlx::query(
            r#"SELECT t.id, t.project_id, t.grid_row, t.grid_col, t.size, t.label,
                t.created_at, t.updated_at,
                w.status AS ws_status,
                w.last_work_record_id AS ws_last_work_record_id,
                w.completed_at AS ws_completed_at,
                w.updated_at AS ws_updated_at
            FROM grid_table t
            LEFT JOIN table_work_state w ON w.table_id = t.id
            WHERE t.project_id = $1
            ORDER BY t.grid_row ASC, t.grid_col ASC"#,
        )
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.iter().map(table_with_state_from_row).collect()
    }

    async fn update_table(&self, id: &str, update: &TableUpdate) -> Result<Table, StoreError> {
        let mut tx = self.state.begin().await?;
        let current = sqlx::query_as::<_, Table>(
            r#"SELECT id, project_id, grid_row, grid_col, size, label, created_at, updated_at
            FROM grid_table WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("table", id))?;

        let size = update.size.unwrap_or(current.size);
        let label = match &update.label {
            Some(value) => value.clone(),
            None => current.label,
        };
        let table = sqlx::query_as::<_, Table>(
            r#"UPDATE grid_table SET size = $1, label = $2, updated_at = $3
            WHERE id = $4
            RETURNING id, project_id, grid_row, grid_col, size, label, created_at, updated_at"#,
        )
        .bind(size.as_str())
        .bind(&label)
        .bind(util::epoch_ms())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        enqueue_tx(
            &mut tx,
            SyncEntity::Table,
            id,
            SyncOperation::Update,
            json_payload(&table),
        )
        .await;
        tx.commit().await?;
        Ok(table)
    }

    async fn delete_table(&self, id: &str) -> Result<(), StoreError> {
        let mut tx = self.state.begin().await?;
        delete_table_tx(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_tables(&self, ids: &[String]) -> Result<(), StoreError> {
        let mut tx = self.state.begin().await?;
        for id in ids {
            delete_table_tx(&mut tx, id).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn count_tables(&self, project_id: &str) -> Result<u64, StoreError> {
        let mut conn = self.state.conn().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM grid_table WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count as u64)
    }

    async fn table_exists(&self, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.state.conn().await?;
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM grid_table WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(exists != 0)
    }
}

impl WorkStateRepository for StoreDb {
    async fn get_work_state(&self, table_id: &str) -> Result<Option<TableWorkState>, StoreError> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, TableWorkState>(
            r#"SELECT table_id, project_id, status, last_work_record_id, completed_at, updated_at
            FROM table_work_state WHERE table_id = $1"#,
        )
        .bind(table_id)
        .fetch_optional(&mut *conn)
        .await?)
    }

    async fn set_work_status(
        &self,
        table_id: &str,
        status: WorkStatus,
    ) -> Result<TableWorkState, StoreError> {
        let mut tx = self.state.begin().await?;
        let project_id: Option<String> =
            sqlx::query_scalar("SELECT project_id FROM grid_table WHERE id = $1")
                .bind(table_id)
                .fetch_optional(&mut *tx)
                .await?;
        let project_id = project_id.ok_or_else(|| StoreError::not_found("table", table_id))?;
        let now = util::epoch_ms();
        let completed_at = (status == WorkStatus::Completed).then_some(now);
        let state = sqlx::query_as::<_, TableWorkState>(
            r#"INSERT INTO table_work_state
            (table_id, project_id, status, last_work_record_id, completed_at, updated_at)
            VALUES ($1, $2, $3, NULL, $4, $5)
            ON CONFLICT (table_id) DO UPDATE SET
                status = excluded.status,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at
            RETURNING table_id, project_id, status, last_work_record_id, completed_at, updated_at"#,
        )
        .bind(table_id)
        .bind(&project_id)
        .bind(status.as_str())
        .bind(completed_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        enqueue_tx(
            &mut tx,
            SyncEntity::WorkState,
            table_id,
            SyncOperation::Update,
            json_payload(&state),
        )
        .await;
        tx.commit().await?;
        Ok(state)
    }

    async fn mark_as_completed(
        &self,
        table_ids: &[String],
        work_record_id: &str,
    ) -> Result<(), StoreError> {
        let now = util::epoch_ms();
        let mut tx = self.state.begin().await?;
        for table_id in table_ids {
            let state = upsert_work_state_tx(
                &mut tx,
                table_id,
                WorkStatus::Completed,
                work_record_id,
                Some(now),
                now,
            )
            .await?
            .ok_or_else(|| StoreError::not_found("table", table_id.as_str()))?;
            enqueue_tx(
                &mut tx,
                SyncEntity::WorkState,
                table_id,
                SyncOperation::Update,
                json_payload(&state),
            )
            .await;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn count_by_status(&self, project_id: &str) -> Result<StatusCounts, StoreError> {
        let rows = self.get_tables_with_work_state(project_id).await?;
        let mut counts = StatusCounts::default();
        for row in &rows {
            counts.bump(row.work_state.status);
        }
        Ok(counts)
    }
}

impl WorkRecordRepository for StoreDb {
    async fn add_work_record(&self, new: &NewWorkRecord) -> Result<WorkRecord, StoreError> {
        let record = WorkRecord::from_new(new)?;
        let mut tx = self.state.begin().await?;
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM project WHERE id = $1)")
            .bind(&record.project_id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(StoreError::not_found("project", record.project_id.as_str()));
        }
        for table_id in &record.table_ids {
            let owner: Option<String> =
                sqlx::query_scalar("SELECT project_id FROM grid_table WHERE id = $1")
                    .bind(table_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match owner {
                None => return Err(StoreError::not_found("table", table_id.as_str())),
                Some(owner) if owner != record.project_id => {
                    return Err(ValidationError::OutOfRange {
                        field: "table_ids",
                        reason: format!("table {table_id} belongs to project {owner}"),
                    }
                    .into());
                }
                Some(_) => {}
            }
        }

        let table_ids_json = serde_json::to_string(&record.table_ids)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        sqlx::query(
            r#"INSERT INTO work_record
            (id, project_id, table_ids, work_type, status, notes, worker_name,
             started_at, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(&record.id)
        .bind(&record.project_id)
        .bind(&table_ids_json)
        .bind(record.work_type.as_str())
        .bind(record.status.as_str())
        .bind(&record.notes)
        .bind(&record.worker_name)
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::from_insert("work record", e))?;

        for table_id in &record.table_ids {
            let state = upsert_work_state_tx(
                &mut tx,
                table_id,
                record.status,
                &record.id,
                record.completed_at,
                record.updated_at,
            )
            .await?
            .ok_or_else(|| StoreError::not_found("table", table_id.as_str()))?;
            enqueue_tx(
                &mut tx,
                SyncEntity::WorkState,
                table_id,
                SyncOperation::Update,
                json_payload(&state),
            )
            .await;
        }
        enqueue_tx(
            &mut tx,
            SyncEntity::WorkRecord,
            &record.id,
            SyncOperation::Create,
            json_payload(&record),
        )
        .await;
        tx.commit().await?;
        Ok(record)
    }

    async fn get_work_record(&self, id: &str) -> Result<WorkRecord, StoreError> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, WorkRecord>(
            r#"SELECT id, project_id, table_ids, work_type, status, notes, worker_name,
                started_at, completed_at, created_at, updated_at
            FROM work_record WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::not_found("work record", id))
    }

    async fn list_work_records(
        &self,
        filter: &WorkRecordFilter,
    ) -> Result<WorkRecordPage, StoreError> {
        let mut clauses: Vec<&'static str> = Vec::new();
        if filter.project_id.is_some() {
            clauses.push("project_id = ?");
        }
        if filter.work_type.is_some() {
            clauses.push("work_type = ?");
        }
        if filter.status.is_some() {
            clauses.push("status = ?");
        }
        if filter.started_after.is_some() {
            clauses.push("started_at >= ?");
        }
        if filter.started_before.is_some() {
            clauses.push("started_at <= ?");
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let mut conn = self.state.conn().await?;

        let count_sql = format!("SELECT COUNT(*) FROM work_record{where_sql}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(project_id) = &filter.project_id {
            count_query = count_query.bind(project_id);
        }
        if let Some(work_type) = filter.work_type {
            count_query = count_query.bind(work_type.as_str());
        }
        if let Some(status) = filter.status {
            count_query = count_query.bind(status.as_str());
        }
        if let Some(after) = filter.started_after {
            count_query = count_query.bind(after);
        }
        if let Some(before) = filter.started_before {
            count_query = count_query.bind(before);
        }
        let total = count_query.fetch_one(&mut *conn).await?;

        let page_sql = format!(
            r#"SELECT id, project_id, table_ids, work_type, status, notes, worker_name,
                started_at, completed_at, created_at, updated_at
            FROM work_record{where_sql}
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?"#
        );
        let mut page_query = sqlx::query_as::<_, WorkRecord>(&page_sql);
        if let Some(project_id) = &filter.project_id {
            page_query = page_query.bind(project_id);
        }
        if let Some(work_type) = filter.work_type {
            page_query = page_query.bind(work_type.as_str());
        }
        if let Some(status) = filter.status {
            page_query = page_query.bind(status.as_str());
        }
        if let Some(after) = filter.started_after {
            page_query = page_query.bind(after);
        }
        if let Some(before) = filter.started_before {
            page_query = page_query.bind(before);
        }
        let records = page_query
            .bind(filter.limit as i64)
            .bind(filter.offset as i64)
            .fetch_all(&mut *conn)
            .await?;

        let has_more = (filter.offset as u64) + (records.len() as u64) < total as u64;
        Ok(WorkRecordPage {
            records,
            total: total as u64,
            has_more,
        })
    }

    async fn delete_work_record(&self, id: &str) -> Result<(), StoreError> {
        let mut tx = self.state.begin().await?;
        let result = sqlx::query("DELETE FROM work_record WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("work record", id));
        }
        purge_and_enqueue_delete_tx(&mut tx, SyncEntity::WorkRecord, id).await;
        tx.commit().await?;
        Ok(())
    }
}

impl SyncQueueRepository for StoreDb {
    async fn enqueue(
        &self,
        entity_type: SyncEntity,
        entity_id: &str,
        op: SyncOperation,
        payload: Option<serde_json::Value>,
    ) -> Result<i64, StoreError> {
        let mut conn = self.state.conn().await?;
        let payload_text = payload.map(|p| p.to_string());
        let result = sqlx::query(
            r#"INSERT INTO sync_queue (entity_type, entity_id, op, payload, created_at)
            VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .bind(op.as_str())
        .bind(payload_text)
        .bind(util::epoch_ms())
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get_pending(&self, limit: u32) -> Result<Vec<SyncQueueItem>, StoreError> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, SyncQueueItem>(
            r#"SELECT id, entity_type, entity_id, op, payload, created_at, attempts,
                last_attempt_at, error
            FROM sync_queue
            WHERE attempts < $1
            ORDER BY id ASC
            LIMIT $2"#,
        )
        .bind(MAX_SYNC_ATTEMPTS)
        .bind(limit as i64)
        .fetch_all(&mut *conn)
        .await?)
    }

    async fn get_failed(&self) -> Result<Vec<SyncQueueItem>, StoreError> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, SyncQueueItem>(
            r#"SELECT id, entity_type, entity_id, op, payload, created_at, attempts,
                last_attempt_at, error
            FROM sync_queue
            WHERE attempts >= $1
            ORDER BY id ASC"#,
        )
        .bind(MAX_SYNC_ATTEMPTS)
        .fetch_all(&mut *conn)
        .await?)
    }

    async fn mark_completed(&self, id: i64) -> Result<(), StoreError> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("sync queue item", id.to_string()));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<(), StoreError> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(
            r#"UPDATE sync_queue
            SET attempts = attempts + 1, last_attempt_at = $2, error = $3
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(util::epoch_ms())
        .bind(error)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("sync queue item", id.to_string()));
        }
        Ok(())
    }

    async fn reset_all_attempts(&self) -> Result<u64, StoreError> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(
            "UPDATE sync_queue SET attempts = 0, last_attempt_at = NULL, error = NULL WHERE attempts > 0",
        )
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    async fn remove_by_entity(
        &self,
        entity_type: SyncEntity,
        entity_id: &str,
    ) -> Result<u64, StoreError> {
        let mut conn = self.state.conn().await?;
        let result =
            sqlx::query("DELETE FROM sync_queue WHERE entity_type = $1 AND entity_id = $2")
                .bind(entity_type.as_str())
                .bind(entity_id)
                .execute(&mut *conn)
                .await?;
        Ok(result.rows_affected())
    }
}

impl SettingsRepository for StoreDb {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.state.conn().await?;
        Ok(
            sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
                .bind(key)
                .fetch_optional(&mut *conn)
                .await?,
        )
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            r#"INSERT INTO settings (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value"#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn get_settings(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.state.conn().await?;
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            let value: Option<String> =
                sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
                    .bind(key)
                    .fetch_optional(&mut *conn)
                    .await?;
            if let Some(value) = value {
                found.insert(key.to_string(), value);
            }
        }
        Ok(found)
    }

    async fn set_settings(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut tx = self.state.begin().await?;
        for (key, value) in entries.iter().copied() {
            sqlx::query(
                r#"INSERT INTO settings (key, value) VALUES ($1, $2)
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value"#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
