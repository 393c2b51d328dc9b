use async_trait::async_trait;
use datafusion::arrow::record_batch::RecordBatch;

use super::{ChunkSink, CollectingSink, DataFetchError, TableMetadata};

/// Trait for reading from the source database.
///
/// Implementors hold a long-lived connection (or pool) acquired before the run
/// starts; every call reuses it.
#[async_trait]
pub trait QueryExecutor: Send + Sync + std::fmt::Debug {
    /// Discover base tables (with ordered columns).
    ///
    /// With `schema_filter` only that schema is inspected, otherwise every
    /// schema except the system catalog.
    async fn discover_tables(
        &self,
        schema_filter: Option<&str>,
    ) -> Result<Vec<TableMetadata>, DataFetchError>;

    /// Run `sql` and hand the result to `sink` in chunks of at most
    /// `chunk_size` rows. `None` delivers the whole result as a single chunk.
    /// An empty result produces no chunks.
    async fn fetch(
        &self,
        sql: &str,
        chunk_size: Option<usize>,
        sink: &mut dyn ChunkSink,
    ) -> Result<(), DataFetchError>;

    /// Run `sql` and collect the whole result in memory.
    async fn fetch_all(&self, sql: &str) -> Result<Vec<RecordBatch>, DataFetchError> {
        let mut sink = CollectingSink::new();
        self.fetch(sql, None, &mut sink).await?;
        Ok(sink.into_chunks())
    }
}
