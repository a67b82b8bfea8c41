//! Integration tests for the calculation engine over stored projects.
//!
//! Tests cover:
//! - Fresh-grid statistics (everything pending, zero percentage progress)
//! - Status counts always summing to the table total
//! - Order-independent value aggregation
//! - Completion percentage rounding

mod common;

// Import traits to bring methods into scope
use gridtrack::core::db::{ProjectRepository, TableRepository, WorkRecordRepository};

use gridtrack::calc;

use common::*;

#[tokio::test]
async fn test_fresh_grid_statistics() -> anyhow::Result<()> {
    // 1. 2x2 grid, all large, untouched
    let (db, _temp_dir) = create_test_store().await;
    let (project, _tables) = seed_project_grid(&db, "Fresh", 2, 2, TableSize::Large).await;

    // 2. Four pending tables, no progress
    let stats = db.project_statistics(&project.id).await?;
    assert_eq!(stats.total_tables, 4);
    assert_eq!(stats.completed_tables, 0);
    assert_eq!(stats.pending_tables, 4);
    assert_eq!(stats.completion_percentage, 0);

    // 3. Electrical totals follow the fixed lookups
    assert_eq!(stats.total_strings, 4 * 8);
    assert_eq!(stats.total_panels, 4 * 8 * u64::from(calc::PANELS_PER_STRING));
    let expected_power = stats.total_panels as f64 * calc::PANEL_POWER_KW;
    assert!((stats.total_power_kw - expected_power).abs() < 1e-9);

    Ok(())
}

#[tokio::test]
async fn test_status_counts_sum_to_total() -> anyhow::Result<()> {
    // 1. Mixed statuses, including tables that never got a state row
    let (db, _temp_dir) = create_test_store().await;
    let (project, tables) = seed_project_grid(&db, "Coverage", 2, 3, TableSize::Medium).await;
    db.add_work_record(&NewWorkRecord {
        project_id: project.id.clone(),
        table_ids: vec![tables[0].id.clone(), tables[1].id.clone()],
        work_type: WorkType::Installation,
        status: WorkStatus::Completed,
        notes: None,
        worker_name: None,
        started_at: None,
        completed_at: None,
    })
    .await?;
    db.add_work_record(&NewWorkRecord {
        project_id: project.id.clone(),
        table_ids: vec![tables[2].id.clone()],
        work_type: WorkType::Installation,
        status: WorkStatus::InProgress,
        notes: None,
        worker_name: None,
        started_at: None,
        completed_at: None,
    })
    .await?;

    // 2. Counts cover every table exactly once
    let stats = db.project_statistics(&project.id).await?;
    assert_eq!(
        stats.completed_tables
            + stats.pending_tables
            + stats.in_progress_tables
            + stats.skipped_tables,
        stats.total_tables
    );
    assert_eq!(stats.total_tables, 6);
    assert_eq!(stats.completed_tables, 2);
    assert_eq!(stats.in_progress_tables, 1);
    assert_eq!(stats.pending_tables, 3);

    Ok(())
}

#[tokio::test]
async fn test_sum_values_is_order_independent() -> anyhow::Result<()> {
    // 1. A grid with mixed sizes
    let (db, _temp_dir) = create_test_store().await;
    let project = db.add_project(&make_new_project("Permute", 2, 3)).await?;
    let batch = vec![
        make_new_table(&project, 0, 0, TableSize::Small),
        make_new_table(&project, 0, 1, TableSize::Medium),
        make_new_table(&project, 0, 2, TableSize::Large),
        make_new_table(&project, 1, 0, TableSize::Large),
        make_new_table(&project, 1, 1, TableSize::Small),
    ];
    let tables = db.add_tables(&batch).await?;

    // 2. Reversing and rotating the slice changes nothing
    let forward = calc::sum_values(tables.iter());
    let backward = calc::sum_values(tables.iter().rev());
    assert_eq!(forward, backward);
    let rotated: Vec<_> = tables[2..].iter().chain(tables[..2].iter()).collect();
    assert_eq!(forward, calc::sum_values(rotated.into_iter()));

    // 3. And equals the element-wise sum
    let mut strings = 0;
    for table in &tables {
        strings += calc::table_values(table).strings;
    }
    assert_eq!(forward.strings, strings);

    Ok(())
}

#[tokio::test]
async fn test_completion_percentage_rounds() -> anyhow::Result<()> {
    // 1. One of three tables completed: 33%
    let (db, _temp_dir) = create_test_store().await;
    let (project, tables) = seed_project_grid(&db, "Round", 1, 3, TableSize::Small).await;
    db.add_work_record(&NewWorkRecord {
        project_id: project.id.clone(),
        table_ids: vec![tables[0].id.clone()],
        work_type: WorkType::Installation,
        status: WorkStatus::Completed,
        notes: None,
        worker_name: None,
        started_at: None,
        completed_at: None,
    })
    .await?;
    let stats = db.project_statistics(&project.id).await?;
    assert_eq!(stats.completion_percentage, 33);

    // 2. Two of three: 67%
    db.add_work_record(&NewWorkRecord {
        project_id: project.id.clone(),
        table_ids: vec![tables[1].id.clone()],
        work_type: WorkType::Installation,
        status: WorkStatus::Completed,
        notes: None,
        worker_name: None,
        started_at: None,
        completed_at: None,
    })
    .await?;
    let stats = db.project_statistics(&project.id).await?;
    assert_eq!(stats.completion_percentage, 67);

    Ok(())
}
