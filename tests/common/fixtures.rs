use gridtrack::core::db::{
    GridConfig, GridPosition, NewProject, NewTable, Project, ProjectRepository, StoreDb, Table,
    TableRepository, TableSize,
};

/// Creates a StoreDb backed by a file in a fresh temp directory.
/// Returns both the store and the temp directory (which must be kept alive).
pub async fn create_test_store() -> (StoreDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("test.gridtrack");
    let db = StoreDb::new(&path)
        .await
        .expect("Failed to open test store");
    (db, dir)
}

pub fn make_new_project(name: &str, rows: u32, columns: u32) -> NewProject {
    NewProject {
        name: name.to_string(),
        description: None,
        location: None,
        grid: GridConfig { rows, columns },
    }
}

pub fn make_new_table(project: &Project, row: u32, column: u32, size: TableSize) -> NewTable {
    NewTable {
        project_id: project.id.clone(),
        position: GridPosition { row, column },
        size,
        label: None,
    }
}

/// Creates a project and fills its whole grid with tables of one size.
pub async fn seed_project_grid(
    db: &StoreDb,
    name: &str,
    rows: u32,
    columns: u32,
    size: TableSize,
) -> (Project, Vec<Table>) {
    let project = db
        .add_project(&make_new_project(name, rows, columns))
        .await
        .expect("Failed to create project");
    let mut batch = Vec::new();
    for row in 0..rows {
        for column in 0..columns {
            batch.push(make_new_table(&project, row, column, size));
        }
    }
    let tables = db
        .add_tables(&batch)
        .await
        .expect("Failed to create tables");
    (project, tables)
}
