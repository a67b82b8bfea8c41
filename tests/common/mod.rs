mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from gridtrack for tests
pub use gridtrack::core::db::{
    GridConfig, GridPosition, NewProject, NewTable, NewWorkRecord, Project, ProjectRepository,
    ProjectStatus, ProjectUpdate, SettingsRepository, StatusCounts, StoreDb, StoreError,
    SyncEntity, SyncOperation, SyncQueueItem, SyncQueueRepository, Table, TableRepository,
    TableSize, TableUpdate, TableWithWorkState, TableWorkState, ValidationError, WorkRecord,
    WorkRecordFilter, WorkRecordPage, WorkRecordRepository, WorkStateRepository, WorkStatus,
    WorkType,
};
