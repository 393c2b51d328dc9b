use crate::datafetch::TableMetadata;

use super::SchemaTables;

/// Columns whose joint presence marks a table as incremental-capable.
pub const TRACKING_COLUMNS: [&str; 3] = ["created_at", "updated_at", "deleted_at"];

/// How a table is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Full,
    Incremental,
}

impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for LoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A discovered table together with its load decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadClassification {
    pub table: TableMetadata,
    pub incremental: bool,
}

/// True iff every tracking column is present. Names are compared exactly.
pub fn is_incremental(table: &TableMetadata) -> bool {
    TRACKING_COLUMNS.iter().all(|column| table.has_column(column))
}

pub fn classify_table(table: TableMetadata) -> LoadClassification {
    let incremental = is_incremental(&table);
    LoadClassification { table, incremental }
}

/// Classify every table, keeping schema grouping and order intact.
pub fn classify(
    groups: Vec<SchemaTables<TableMetadata>>,
) -> Vec<SchemaTables<LoadClassification>> {
    groups
        .into_iter()
        .map(|group| SchemaTables {
            ident: group.ident,
            tables: group.tables.into_iter().map(classify_table).collect(),
        })
        .collect()
}
