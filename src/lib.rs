pub mod calc;
pub mod core;
pub mod fieldmap;

pub use crate::calc::{ProjectStatistics, TableValues};
pub use crate::core::db::{
    GridConfig, GridPosition, MAX_GRID_DIM, MAX_SYNC_ATTEMPTS, NewProject, NewTable,
    NewWorkRecord, Project, ProjectRepository, ProjectStatus, ProjectUpdate, SettingsRepository,
    StatusCounts, StoreDb, StoreError, SyncEntity, SyncOperation, SyncQueueItem,
    SyncQueueRepository, Table, TableRepository, TableSize, TableUpdate, TableWithWorkState,
    TableWorkState, ValidationError, WorkRecord, WorkRecordFilter, WorkRecordPage,
    WorkRecordRepository, WorkStateRepository, WorkStatus, WorkType, setting_keys,
};
pub use crate::fieldmap::{FieldMap, FieldMapError, SelectionPhase, WorkPreview};
