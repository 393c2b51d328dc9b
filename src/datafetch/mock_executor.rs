//! Mock query executor for testing.
//!
//! Serves canned results keyed by the exact SQL text so the extraction engine
//! can be exercised without a real database.

use async_trait::async_trait;
use datafusion::arrow::record_batch::RecordBatch;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{ChunkSink, DataFetchError, QueryExecutor, TableMetadata};

/// A query observed by the mock, in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedQuery {
    pub sql: String,
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Default)]
pub struct MockExecutor {
    tables: Mutex<Vec<TableMetadata>>,
    results: Mutex<HashMap<String, RecordBatch>>,
    failing: Mutex<HashSet<String>>,
    queries: Mutex<Vec<ExecutedQuery>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table returned by `discover_tables`.
    pub fn add_table(&self, table: TableMetadata) {
        self.tables.lock().unwrap().push(table);
    }

    /// Register the result served for `sql`. Replaces any earlier result.
    pub fn set_result(&self, sql: &str, batch: RecordBatch) {
        self.results
            .lock()
            .unwrap()
            .insert(sql.to_string(), batch);
    }

    /// Make `sql` fail with a query error.
    pub fn fail_on(&self, sql: &str) {
        self.failing.lock().unwrap().insert(sql.to_string());
    }

    pub fn queries(&self) -> Vec<ExecutedQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn discover_tables(
        &self,
        schema_filter: Option<&str>,
    ) -> Result<Vec<TableMetadata>, DataFetchError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .iter()
            .filter(|t| schema_filter.map_or(true, |schema| t.schema_name == schema))
            .cloned()
            .collect())
    }

    async fn fetch(
        &self,
        sql: &str,
        chunk_size: Option<usize>,
        sink: &mut dyn ChunkSink,
    ) -> Result<(), DataFetchError> {
        self.queries.lock().unwrap().push(ExecutedQuery {
            sql: sql.to_string(),
            chunk_size,
        });

        if self.failing.lock().unwrap().contains(sql) {
            return Err(DataFetchError::Query(format!("mock failure for: {sql}")));
        }

        let batch = self
            .results
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .ok_or_else(|| DataFetchError::Query(format!("no result registered for: {sql}")))?;

        let total = batch.num_rows();
        let step = chunk_size.unwrap_or(total).max(1);
        let mut offset = 0;
        while offset < total {
            let len = step.min(total - offset);
            sink.write_chunk(batch.slice(offset, len)).await?;
            offset += len;
        }

        Ok(())
    }
}
