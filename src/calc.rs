//! Pure derivations of electrical values and project statistics. No I/O;
//! everything here is a function of the entity values passed in.

use serde::Serialize;

use crate::core::db::{Table, TableSize, TableWithWorkState, WorkStatus};

pub const PANELS_PER_STRING: u32 = 26;
pub const PANEL_POWER_KW: f64 = 0.55;

/// Derived electrical values of one or more tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableValues {
    pub strings: u32,
    pub panels: u32,
    pub power_kw: f64,
}

/// Aggregated view of one project's grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatistics {
    pub total_tables: u64,
    pub completed_tables: u64,
    pub pending_tables: u64,
    pub in_progress_tables: u64,
    pub skipped_tables: u64,
    pub total_strings: u64,
    pub total_panels: u64,
    pub total_power_kw: f64,
    /// Rounded percentage of completed tables; 0 for an empty project.
    pub completion_percentage: u8,
}

pub fn strings_for_size(size: TableSize) -> u32 {
    match size {
        TableSize::Small => 4,
        TableSize::Medium => 6,
        TableSize::Large => 8,
    }
}

pub fn panels_from_strings(strings: u32) -> u32 {
    strings * PANELS_PER_STRING
}

pub fn power_from_panels(panels: u32) -> f64 {
    f64::from(panels) * PANEL_POWER_KW
}

pub fn table_values(table: &Table) -> TableValues {
    let strings = strings_for_size(table.size);
    let panels = panels_from_strings(strings);
    TableValues {
        strings,
        panels,
        power_kw: power_from_panels(panels),
    }
}

/// Order-independent: equals the sum of `table_values` over every element.
/// Power is derived from the summed panel count, so the result is exact for
/// any permutation of the input.
pub fn sum_values<'a, I>(tables: I) -> TableValues
where
    I: IntoIterator<Item = &'a Table>,
{
    let (strings, panels) = tables.into_iter().fold((0, 0), |(strings, panels), table| {
        let values = table_values(table);
        (strings + values.strings, panels + values.panels)
    });
    TableValues {
        strings,
        panels,
        power_kw: power_from_panels(panels),
    }
}

pub fn project_statistics(rows: &[TableWithWorkState]) -> ProjectStatistics {
    let mut stats = ProjectStatistics::default();
    for row in rows {
        stats.total_tables += 1;
        match row.work_state.status {
            WorkStatus::Pending => stats.pending_tables += 1,
            WorkStatus::InProgress => stats.in_progress_tables += 1,
            WorkStatus::Completed => stats.completed_tables += 1,
            WorkStatus::Skipped => stats.skipped_tables += 1,
        }
        let values = table_values(&row.table);
        stats.total_strings += u64::from(values.strings);
        stats.total_panels += u64::from(values.panels);
    }
    stats.total_power_kw = stats.total_panels as f64 * PANEL_POWER_KW;
    stats.completion_percentage = if stats.total_tables == 0 {
        0
    } else {
        (100.0 * stats.completed_tables as f64 / stats.total_tables as f64).round() as u8
    };
    stats
}
