use serde::Serialize;

/// Position of a table within a project's grid. Unique per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GridPosition {
    pub row: u32,
    pub column: u32,
}

/// Grid dimensions of a project, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridConfig {
    pub rows: u32,
    pub columns: u32,
}

impl GridConfig {
    pub fn contains(&self, position: &GridPosition) -> bool {
        position.row < self.rows && position.column < self.columns
    }

    pub fn capacity(&self) -> u32 {
        self.rows * self.columns
    }
}
