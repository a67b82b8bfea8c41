//! Selection and work-confirmation controller for one project's field map.
//! Browsing and selecting are pure in-memory state; the single repository
//! write happens on submit, after explicit confirmation.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::calc::{self, TableValues};
use crate::core::db::{
    NewWorkRecord, ProjectRepository, StoreDb, StoreError, TableRepository, TableWithWorkState,
    WorkRecord, WorkRecordRepository, WorkStatus, WorkType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    Idle,
    Selecting,
    Confirming,
    Submitting,
}

#[derive(Debug, Error)]
pub enum FieldMapError {
    #[error("no table with id {0} on this field map")]
    UnknownTable(String),
    #[error("selection is empty")]
    EmptySelection,
    #[error("a submission is already in flight")]
    SubmitInFlight,
    #[error("confirmation sheet is not open")]
    NotConfirming,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary shown on the confirmation sheet before anything is written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkPreview {
    pub selected: usize,
    pub values: TableValues,
}

#[derive(Debug)]
pub struct FieldMap {
    db: StoreDb,
    project_id: String,
    tables: Vec<TableWithWorkState>,
    selection: BTreeSet<String>,
    phase: SelectionPhase,
    last_error: Option<String>,
}

impl FieldMap {
    pub async fn open(db: StoreDb, project_id: &str) -> Result<Self, FieldMapError> {
        let project = db.get_project(project_id).await?;
        let tables = db.get_tables_with_work_state(&project.id).await?;
        Ok(FieldMap {
            db,
            project_id: project.id,
            tables,
            selection: BTreeSet::new(),
            phase: SelectionPhase::Idle,
            last_error: None,
        })
    }

    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    pub fn tables(&self) -> &[TableWithWorkState] {
        &self.tables
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Flip a table in or out of the selection. Returns whether the table is
    /// selected afterwards. Allowed in every phase except Submitting.
    pub fn toggle(&mut self, table_id: &str) -> Result<bool, FieldMapError> {
        if self.phase == SelectionPhase::Submitting {
            return Err(FieldMapError::SubmitInFlight);
        }
        if !self.tables.iter().any(|row| row.table.id == table_id) {
            return Err(FieldMapError::UnknownTable(table_id.to_string()));
        }
        let selected = if self.selection.remove(table_id) {
            false
        } else {
            self.selection.insert(table_id.to_string());
            true
        };
        self.phase = match (self.phase, self.selection.is_empty()) {
            (_, true) => SelectionPhase::Idle,
            (SelectionPhase::Confirming, false) => SelectionPhase::Confirming,
            (_, false) => SelectionPhase::Selecting,
        };
        Ok(selected)
    }

    pub fn open_confirmation(&mut self) -> Result<(), FieldMapError> {
        if self.phase == SelectionPhase::Submitting {
            return Err(FieldMapError::SubmitInFlight);
        }
        if self.selection.is_empty() {
            return Err(FieldMapError::EmptySelection);
        }
        self.phase = SelectionPhase::Confirming;
        Ok(())
    }

    pub fn cancel_confirmation(&mut self) {
        if self.phase == SelectionPhase::Confirming {
            self.phase = SelectionPhase::Selecting;
        }
    }

    pub fn preview(&self) -> WorkPreview {
        let selected_tables = self
            .tables
            .iter()
            .filter(|row| self.selection.contains(&row.table.id))
            .map(|row| &row.table);
        WorkPreview {
            selected: self.selection.len(),
            values: calc::sum_values(selected_tables),
        }
    }

    /// Write the confirmed selection as one work record. On success the
    /// selection is cleared and the view is reloaded from the repository; on
    /// failure the confirmation stays open with the selection intact so the
    /// submit can be retried.
    pub async fn submit(
        &mut self,
        work_type: WorkType,
        status: WorkStatus,
        notes: Option<String>,
        worker_name: Option<String>,
    ) -> Result<WorkRecord, FieldMapError> {
        match self.phase {
            SelectionPhase::Submitting => return Err(FieldMapError::SubmitInFlight),
            SelectionPhase::Confirming => {}
            _ => return Err(FieldMapError::NotConfirming),
        }
        self.phase = SelectionPhase::Submitting;
        let new = NewWorkRecord {
            project_id: self.project_id.clone(),
            table_ids: self.selection.iter().cloned().collect(),
            work_type,
            status,
            notes,
            worker_name,
            started_at: None,
            completed_at: None,
        };
        match self.db.add_work_record(&new).await {
            Ok(record) => {
                self.selection.clear();
                self.last_error = None;
                self.phase = SelectionPhase::Idle;
                self.refresh().await?;
                Ok(record)
            }
            Err(err) => {
                self.phase = SelectionPhase::Confirming;
                self.last_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Reload the table view from the repository.
    pub async fn refresh(&mut self) -> Result<(), FieldMapError> {
        self.tables = self.db.get_tables_with_work_state(&self.project_id).await?;
        Ok(())
    }
}
