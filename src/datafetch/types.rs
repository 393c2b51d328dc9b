/// Metadata for a discovered table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    /// Database the table lives in, when the driver reports one (PostgreSQL does, MySQL does not)
    pub catalog_name: Option<String>,
    pub schema_name: String,
    pub table_name: String,
    /// Columns in ordinal order
    pub columns: Vec<ColumnMetadata>,
}

/// Metadata for a table column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    /// Type name as reported by the source's information_schema
    pub data_type: String,
    pub nullable: bool,
    pub ordinal_position: i32,
}

impl TableMetadata {
    pub fn new(catalog_name: Option<&str>, schema_name: &str, table_name: &str) -> Self {
        Self {
            catalog_name: catalog_name.map(str::to_string),
            schema_name: schema_name.to_string(),
            table_name: table_name.to_string(),
            columns: Vec::new(),
        }
    }

    /// Append a column, assigning the next ordinal position.
    pub fn with_column(mut self, name: &str, data_type: &str) -> Self {
        let ordinal_position = self.columns.len() as i32 + 1;
        self.columns.push(ColumnMetadata {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            ordinal_position,
        });
        self
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// Fold flat (table, column) rows from an information_schema join into tables,
/// preserving the order in which tables first appear.
pub(crate) fn push_column(
    tables: &mut Vec<TableMetadata>,
    catalog: Option<String>,
    schema: String,
    table: String,
    column: ColumnMetadata,
) {
    if let Some(existing) = tables
        .iter_mut()
        .find(|t| t.catalog_name == catalog && t.schema_name == schema && t.table_name == table)
    {
        existing.columns.push(column);
    } else {
        tables.push(TableMetadata {
            catalog_name: catalog,
            schema_name: schema,
            table_name: table,
            columns: vec![column],
        });
    }
}
