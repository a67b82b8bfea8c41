//! Integration tests for the field map selection workflow.
//!
//! Tests cover:
//! - Phase transitions from browsing through confirmation to submission
//! - No repository write before submit
//! - Submit success clearing the selection and reloading persisted state
//! - Submit failure keeping the confirmation open with the selection intact

mod common;

// Import traits to bring methods into scope
use gridtrack::core::db::{TableRepository, WorkRecordRepository};

use gridtrack::fieldmap::{FieldMap, FieldMapError, SelectionPhase};

use common::*;

#[tokio::test]
async fn test_selection_phase_transitions() -> anyhow::Result<()> {
    // 1. Open the field map over a seeded grid
    let (db, _temp_dir) = create_test_store().await;
    let (project, tables) = seed_project_grid(&db, "Phases", 2, 2, TableSize::Medium).await;
    let mut map = FieldMap::open(db.clone(), &project.id).await?;
    assert_eq!(map.phase(), SelectionPhase::Idle);
    assert_eq!(map.tables().len(), 4);

    // 2. Confirmation needs a selection
    assert!(matches!(map.open_confirmation(), Err(FieldMapError::EmptySelection)));

    // 3. Toggling moves between Idle and Selecting
    assert!(map.toggle(&tables[0].id)?);
    assert_eq!(map.phase(), SelectionPhase::Selecting);
    assert!(!map.toggle(&tables[0].id)?);
    assert_eq!(map.phase(), SelectionPhase::Idle);

    // 4. Unknown ids are rejected
    assert!(matches!(map.toggle("bogus"), Err(FieldMapError::UnknownTable(_))));

    // 5. Confirm with two tables selected; preview sums their values
    map.toggle(&tables[0].id)?;
    map.toggle(&tables[1].id)?;
    map.open_confirmation()?;
    assert_eq!(map.phase(), SelectionPhase::Confirming);
    let preview = map.preview();
    assert_eq!(preview.selected, 2);
    assert_eq!(preview.values.strings, 2 * 6);

    // 6. Deselecting inside the sheet keeps confirming until empty
    map.toggle(&tables[1].id)?;
    assert_eq!(map.phase(), SelectionPhase::Confirming);
    map.toggle(&tables[0].id)?;
    assert_eq!(map.phase(), SelectionPhase::Idle);

    // 7. Cancel returns to Selecting with the selection kept
    map.toggle(&tables[0].id)?;
    map.open_confirmation()?;
    map.cancel_confirmation();
    assert_eq!(map.phase(), SelectionPhase::Selecting);
    assert_eq!(map.selection().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_no_write_before_submit() -> anyhow::Result<()> {
    // 1. Select and confirm, but never submit
    let (db, _temp_dir) = create_test_store().await;
    let (project, tables) = seed_project_grid(&db, "NoWrite", 1, 2, TableSize::Small).await;
    let mut map = FieldMap::open(db.clone(), &project.id).await?;
    map.toggle(&tables[0].id)?;
    map.toggle(&tables[1].id)?;
    map.open_confirmation()?;

    // 2. The repository saw nothing
    let page = db
        .list_work_records(&WorkRecordFilter {
            project_id: Some(project.id.clone()),
            ..Default::default()
        })
        .await?;
    assert_eq!(page.total, 0);
    let rows = db.get_tables_with_work_state(&project.id).await?;
    assert!(rows.iter().all(|row| matches!(row.work_state.status, WorkStatus::Pending)));

    Ok(())
}

#[tokio::test]
async fn test_submit_writes_once_and_refreshes() -> anyhow::Result<()> {
    // 1. Confirm two of four tables
    let (db, _temp_dir) = create_test_store().await;
    let (project, tables) = seed_project_grid(&db, "Submit", 2, 2, TableSize::Large).await;
    let mut map = FieldMap::open(db.clone(), &project.id).await?;
    map.toggle(&tables[0].id)?;
    map.toggle(&tables[1].id)?;

    // 2. Submit is only reachable through the confirmation sheet
    let result = map
        .submit(WorkType::Installation, WorkStatus::Completed, None, None)
        .await;
    assert!(matches!(result, Err(FieldMapError::NotConfirming)));

    // 3. Confirm and submit
    map.open_confirmation()?;
    let record = map
        .submit(
            WorkType::Installation,
            WorkStatus::Completed,
            Some("front rows".to_string()),
            Some("Dana".to_string()),
        )
        .await?;
    assert_eq!(record.table_ids.len(), 2);

    // 4. Selection cleared, sheet closed, view reloaded from the store
    assert_eq!(map.phase(), SelectionPhase::Idle);
    assert!(map.selection().is_empty());
    assert!(map.last_error().is_none());
    let completed = map
        .tables()
        .iter()
        .filter(|row| matches!(row.work_state.status, WorkStatus::Completed))
        .count();
    assert_eq!(completed, 2);

    // 5. Exactly one record was written
    let page = db
        .list_work_records(&WorkRecordFilter {
            project_id: Some(project.id.clone()),
            ..Default::default()
        })
        .await?;
    assert_eq!(page.total, 1);

    Ok(())
}

#[tokio::test]
async fn test_submit_failure_preserves_selection() -> anyhow::Result<()> {
    // 1. Confirm two tables, then one vanishes underneath the sheet
    let (db, _temp_dir) = create_test_store().await;
    let (project, tables) = seed_project_grid(&db, "Retry", 1, 3, TableSize::Small).await;
    let mut map = FieldMap::open(db.clone(), &project.id).await?;
    map.toggle(&tables[0].id)?;
    map.toggle(&tables[1].id)?;
    map.open_confirmation()?;
    db.delete_table(&tables[1].id).await?;

    // 2. The submit fails; the sheet stays open and the selection survives
    let result = map
        .submit(WorkType::Installation, WorkStatus::Completed, None, None)
        .await;
    assert!(matches!(result, Err(FieldMapError::Store(StoreError::NotFound { .. }))));
    assert_eq!(map.phase(), SelectionPhase::Confirming);
    assert_eq!(map.selection().len(), 2);
    assert!(map.last_error().is_some());

    // 3. Nothing was written by the failed attempt
    let page = db
        .list_work_records(&WorkRecordFilter {
            project_id: Some(project.id.clone()),
            ..Default::default()
        })
        .await?;
    assert_eq!(page.total, 0);

    // 4. Dropping the dead table from the selection allows a clean retry
    map.toggle(&tables[1].id)?;
    assert_eq!(map.phase(), SelectionPhase::Confirming);
    let record = map
        .submit(WorkType::Installation, WorkStatus::Completed, None, None)
        .await?;
    assert_eq!(record.table_ids, vec![tables[0].id.clone()]);
    assert_eq!(map.phase(), SelectionPhase::Idle);

    Ok(())
}
