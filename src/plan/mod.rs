//! Turning discovered tables into load plans: grouping by schema, classifying
//! each table as full or incremental, and deriving its storage path and query.

mod classify;
mod path;

pub use classify::{
    classify, classify_table, is_incremental, LoadClassification, LoadMode, TRACKING_COLUMNS,
};
pub use path::{
    full_load_key, incremental_load_key, plan_all, plan_table, LoadPlan, LATEST_SEGMENT,
};

use crate::datafetch::TableMetadata;

/// Identifier of the namespace a table is addressed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaIdent {
    Simple(String),
    Compound { database: String, schema: String },
}

impl SchemaIdent {
    /// The schema part, which is all the query needs against the active connection.
    pub fn schema(&self) -> &str {
        match self {
            SchemaIdent::Simple(schema) => schema,
            SchemaIdent::Compound { schema, .. } => schema,
        }
    }

    pub fn database(&self) -> Option<&str> {
        match self {
            SchemaIdent::Simple(_) => None,
            SchemaIdent::Compound { database, .. } => Some(database),
        }
    }
}

impl std::fmt::Display for SchemaIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaIdent::Simple(schema) => write!(f, "{}", schema),
            SchemaIdent::Compound { database, schema } => write!(f, "{}.{}", database, schema),
        }
    }
}

/// Tables belonging to one schema identifier, in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTables<T> {
    pub ident: SchemaIdent,
    pub tables: Vec<T>,
}

/// Group discovered tables by schema, preserving the order in which schemas
/// and tables were enumerated.
///
/// With `include_database` set, tables whose driver reported a database are
/// grouped under [`SchemaIdent::Compound`].
pub fn group_by_schema(
    tables: Vec<TableMetadata>,
    include_database: bool,
) -> Vec<SchemaTables<TableMetadata>> {
    let mut groups: Vec<SchemaTables<TableMetadata>> = Vec::new();

    for table in tables {
        let ident = match (&table.catalog_name, include_database) {
            (Some(database), true) => SchemaIdent::Compound {
                database: database.clone(),
                schema: table.schema_name.clone(),
            },
            _ => SchemaIdent::Simple(table.schema_name.clone()),
        };

        match groups.iter_mut().find(|g| g.ident == ident) {
            Some(group) => group.tables.push(table),
            None => groups.push(SchemaTables {
                ident,
                tables: vec![table],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(catalog: Option<&str>, schema: &str, name: &str) -> TableMetadata {
        TableMetadata::new(catalog, schema, name).with_column("id", "integer")
    }

    #[test]
    fn test_group_by_schema_preserves_order() {
        let groups = group_by_schema(
            vec![
                table(None, "sales", "orders"),
                table(None, "hr", "staff"),
                table(None, "sales", "regions"),
            ],
            false,
        );

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].ident, SchemaIdent::Simple("sales".into()));
        let names: Vec<_> = groups[0].tables.iter().map(|t| t.table_name.as_str()).collect();
        assert_eq!(names, vec!["orders", "regions"]);
        assert_eq!(groups[1].ident, SchemaIdent::Simple("hr".into()));
    }

    #[test]
    fn test_group_by_schema_compound_only_when_requested() {
        let tables = vec![table(Some("shop"), "sales", "orders")];

        let simple = group_by_schema(tables.clone(), false);
        assert_eq!(simple[0].ident, SchemaIdent::Simple("sales".into()));

        let compound = group_by_schema(tables, true);
        assert_eq!(
            compound[0].ident,
            SchemaIdent::Compound {
                database: "shop".into(),
                schema: "sales".into()
            }
        );
    }

    #[test]
    fn test_group_by_schema_without_catalog_stays_simple() {
        let groups = group_by_schema(vec![table(None, "shop", "orders")], true);
        assert_eq!(groups[0].ident, SchemaIdent::Simple("shop".into()));
    }

    #[test]
    fn test_schema_ident_display() {
        let compound = SchemaIdent::Compound {
            database: "dvdrental".into(),
            schema: "public".into(),
        };
        assert_eq!(compound.to_string(), "dvdrental.public");
        assert_eq!(compound.schema(), "public");
        assert_eq!(compound.database(), Some("dvdrental"));
        assert_eq!(SchemaIdent::Simple("public".into()).database(), None);
    }
}
