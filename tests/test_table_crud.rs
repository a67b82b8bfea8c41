//! Integration tests for grid table CRUD operations.
//!
//! Tests cover:
//! - Table creation seeding the default pending work state
//! - Unique grid position and grid bounds enforcement
//! - Atomic batch creation (one bad DTO writes nothing)
//! - The table/work-state join never dropping a table
//! - Updating and deleting tables

mod common;

// Import traits to bring methods into scope
use gridtrack::core::db::{ProjectRepository, TableRepository, WorkStateRepository};

use common::*;

#[tokio::test]
async fn test_add_table_seeds_pending_work_state() -> anyhow::Result<()> {
    // 1. Create project and one table
    let (db, _temp_dir) = create_test_store().await;
    let project = db.add_project(&make_new_project("Seed Test", 2, 2)).await?;
    let table = db.add_table(&make_new_table(&project, 0, 1, TableSize::Medium)).await?;

    assert_eq!(table.project_id, project.id);
    assert_eq!(table.position, GridPosition { row: 0, column: 1 });

    // 2. The companion work state exists immediately, pending, unlinked
    let state = db.get_work_state(&table.id).await?.expect("work state should be co-created");
    assert!(matches!(state.status, WorkStatus::Pending));
    assert!(state.last_work_record_id.is_none());
    assert!(state.completed_at.is_none());

    Ok(())
}

#[tokio::test]
async fn test_grid_position_constraints() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_store().await;
    let project = db.add_project(&make_new_project("Positions", 2, 2)).await?;
    db.add_table(&make_new_table(&project, 0, 0, TableSize::Small)).await?;

    // 1. Same position again is a duplicate
    let result = db.add_table(&make_new_table(&project, 0, 0, TableSize::Large)).await;
    assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));

    // 2. Position outside the 2x2 grid is rejected before writing
    let result = db.add_table(&make_new_table(&project, 2, 0, TableSize::Small)).await;
    assert!(matches!(
        result,
        Err(StoreError::Validation(ValidationError::OutOfRange { .. }))
    ));

    // 3. Unknown project is NotFound
    let mut orphan = make_new_table(&project, 1, 1, TableSize::Small);
    orphan.project_id = "no-such-project".to_string();
    let result = db.add_table(&orphan).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));

    // 4. Only the first table exists; the position lookup finds it
    assert_eq!(db.count_tables(&project.id).await?, 1);
    let found = db.get_table_at(&project.id, GridPosition { row: 0, column: 0 }).await?;
    assert!(found.is_some());
    let missing = db.get_table_at(&project.id, GridPosition { row: 1, column: 1 }).await?;
    assert!(missing.is_none());

    Ok(())
}

#[tokio::test]
async fn test_add_tables_batch_is_atomic() -> anyhow::Result<()> {
    // 1. Create project and a batch with one out-of-grid entry at the end
    let (db, _temp_dir) = create_test_store().await;
    let project = db.add_project(&make_new_project("Batch", 2, 2)).await?;
    let batch = vec![
        make_new_table(&project, 0, 0, TableSize::Large),
        make_new_table(&project, 0, 1, TableSize::Large),
        make_new_table(&project, 5, 5, TableSize::Large),
    ];

    // 2. The whole batch fails and zero rows are written
    let result = db.add_tables(&batch).await;
    assert!(matches!(
        result,
        Err(StoreError::Validation(ValidationError::OutOfRange { .. }))
    ));
    assert_eq!(db.count_tables(&project.id).await?, 0);
    assert!(db.get_tables_with_work_state(&project.id).await?.is_empty());

    // 3. A clean batch goes through in one call
    let batch = vec![
        make_new_table(&project, 0, 0, TableSize::Large),
        make_new_table(&project, 0, 1, TableSize::Large),
    ];
    let created = db.add_tables(&batch).await?;
    assert_eq!(created.len(), 2);
    assert_eq!(db.count_tables(&project.id).await?, 2);

    Ok(())
}

#[tokio::test]
async fn test_join_never_omits_a_table() -> anyhow::Result<()> {
    // 1. Seed a full 2x2 grid
    let (db, _temp_dir) = create_test_store().await;
    let (project, tables) = seed_project_grid(&db, "Join", 2, 2, TableSize::Small).await;

    // 2. Every table appears, defaulted to pending
    let rows = db.get_tables_with_work_state(&project.id).await?;
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| matches!(row.work_state.status, WorkStatus::Pending)));

    // 3. An explicit status change shows up in the join without losing rows
    db.set_work_status(&tables[0].id, WorkStatus::InProgress).await?;
    let rows = db.get_tables_with_work_state(&project.id).await?;
    assert_eq!(rows.len(), 4);
    let changed = rows.iter().find(|row| row.table.id == tables[0].id).unwrap();
    assert!(matches!(changed.work_state.status, WorkStatus::InProgress));

    Ok(())
}

#[tokio::test]
async fn test_update_and_delete_table() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_store().await;
    let project = db.add_project(&make_new_project("Mutate", 2, 2)).await?;
    let table = db.add_table(&make_new_table(&project, 1, 0, TableSize::Small)).await?;

    // 1. Update size and set a label
    let update = TableUpdate {
        size: Some(TableSize::Large),
        label: Some(Some("A-12".to_string())),
    };
    let updated = db.update_table(&table.id, &update).await?;
    assert!(matches!(updated.size, TableSize::Large));
    assert_eq!(updated.label.as_deref(), Some("A-12"));
    assert_eq!(updated.position, table.position);

    // 2. Delete removes the table and its work state
    db.delete_table(&table.id).await?;
    let result = db.get_table(&table.id).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
    assert!(db.get_work_state(&table.id).await?.is_none());
    assert!(!db.table_exists(&table.id).await?);

    // 3. Deleting again is NotFound
    let result = db.delete_table(&table.id).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));

    Ok(())
}
