use chrono::NaiveDate;
use serde::Serialize;

use super::{LoadClassification, LoadMode, SchemaIdent, SchemaTables};

/// Fixed segment under which the current state of every table lands.
pub const LATEST_SEGMENT: &str = "latest";

/// Per-table unit of work for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadPlan {
    /// Storage prefix, always ending in `/`.
    pub object_path: String,
    /// `schema.table`, interpolated into SQL as-is.
    pub table_query: String,
    pub incremental: bool,
}

impl LoadPlan {
    pub fn mode(&self) -> LoadMode {
        if self.incremental {
            LoadMode::Incremental
        } else {
            LoadMode::Full
        }
    }
}

pub fn plan_table(ident: &SchemaIdent, classification: &LoadClassification) -> LoadPlan {
    let table = &classification.table.table_name;
    let object_path = match ident {
        SchemaIdent::Compound { database, schema } => {
            format!("{database}/{schema}/{table}/{LATEST_SEGMENT}/")
        }
        SchemaIdent::Simple(schema) => format!("{schema}/{table}/{LATEST_SEGMENT}/"),
    };

    LoadPlan {
        object_path,
        table_query: format!("{}.{}", ident.schema(), table),
        incremental: classification.incremental,
    }
}

/// Plans for every classified table, in schema then table order.
pub fn plan_all(groups: &[SchemaTables<LoadClassification>]) -> Vec<LoadPlan> {
    groups
        .iter()
        .flat_map(|group| {
            group
                .tables
                .iter()
                .map(move |classification| plan_table(&group.ident, classification))
        })
        .collect()
}

/// Key of the `chunk_index`-th object of a full load.
pub fn full_load_key(object_path: &str, date: NaiveDate, chunk_index: usize) -> String {
    format!("{object_path}{}_{chunk_index}.parquet", date.format("%Y%m%d"))
}

/// Key of the single object an incremental load writes.
pub fn incremental_load_key(object_path: &str, date: NaiveDate) -> String {
    format!("{object_path}{}.parquet", date.format("%Y%m%d"))
}
