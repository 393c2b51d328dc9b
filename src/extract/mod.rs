//! Executing load plans: full chunked loads, incremental loads and the engine
//! that sequences them.

mod clock;
mod engine;
mod full;
mod incremental;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{ExtractOptions, ExtractionEngine};
pub use full::FullLoader;
pub use incremental::{changed_rows_query, IncrementalLoader};

use serde::Serialize;

/// Maximum rows per object written by a full load.
pub const FULL_LOAD_CHUNK_SIZE: usize = 10_000;

/// How a table ended up being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableLoadKind {
    Full,
    /// Incremental-capable table with nothing stored yet.
    FullFallback,
    Incremental,
    NoChanges,
}

impl TableLoadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::FullFallback => "full_fallback",
            Self::Incremental => "incremental",
            Self::NoChanges => "no_changes",
        }
    }
}

impl std::fmt::Display for TableLoadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of loading one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoad {
    pub table_query: String,
    pub object_path: String,
    pub kind: TableLoadKind,
    pub rows: usize,
    /// Keys written, in upload order.
    pub objects: Vec<String>,
}

/// Per-table outcomes of a run, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub tables: Vec<TableLoad>,
}

impl RunReport {
    pub fn object_count(&self) -> usize {
        self.tables.iter().map(|t| t.objects.len()).sum()
    }

    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }

    pub fn table(&self, table_query: &str) -> Option<&TableLoad> {
        self.tables.iter().find(|t| t.table_query == table_query)
    }
}
