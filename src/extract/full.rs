use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use datafusion::arrow::record_batch::RecordBatch;
use std::sync::Arc;
use tracing::{debug, info};

use super::clock::Clock;
use super::{TableLoad, TableLoadKind};
use crate::datafetch::{
    encode_batches, ChunkSink, DataFetchError, QueryExecutor, PARQUET_CONTENT_TYPE,
};
use crate::plan::full_load_key;
use crate::storage::StorageGateway;

/// Streams a whole table in bounded chunks, one object per chunk.
#[derive(Debug, Clone)]
pub struct FullLoader {
    executor: Arc<dyn QueryExecutor>,
    storage: Arc<dyn StorageGateway>,
    clock: Arc<dyn Clock>,
    chunk_size: usize,
}

impl FullLoader {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        storage: Arc<dyn StorageGateway>,
        clock: Arc<dyn Clock>,
        chunk_size: usize,
    ) -> Self {
        Self {
            executor,
            storage,
            clock,
            chunk_size,
        }
    }

    /// Extract every row of `table_query` under `object_path`.
    ///
    /// Chunks are uploaded as `{object_path}{YYYYMMDD}_{index}.parquet` with
    /// indices counting up from 0. An empty table writes nothing.
    pub async fn load_all(&self, object_path: &str, table_query: &str) -> Result<TableLoad> {
        let date = self.clock.today();
        let sql = format!("SELECT * FROM {table_query}");

        let mut sink = UploadingSink {
            storage: self.storage.as_ref(),
            object_path,
            date,
            next_index: 0,
            rows: 0,
            keys: Vec::new(),
        };

        self.executor
            .fetch(&sql, Some(self.chunk_size), &mut sink)
            .await
            .with_context(|| format!("Full load of {table_query} failed"))?;

        info!(
            table = table_query,
            object_path,
            rows = sink.rows,
            chunks = sink.keys.len(),
            "Full load complete"
        );

        Ok(TableLoad {
            table_query: table_query.to_string(),
            object_path: object_path.to_string(),
            kind: TableLoadKind::Full,
            rows: sink.rows,
            objects: sink.keys,
        })
    }
}

/// Encodes and uploads each chunk before the next one is read.
struct UploadingSink<'a> {
    storage: &'a dyn StorageGateway,
    object_path: &'a str,
    date: NaiveDate,
    next_index: usize,
    rows: usize,
    keys: Vec<String>,
}

#[async_trait]
impl ChunkSink for UploadingSink<'_> {
    async fn write_chunk(&mut self, chunk: RecordBatch) -> Result<(), DataFetchError> {
        let encoded = encode_batches(std::slice::from_ref(&chunk))?;
        let key = full_load_key(self.object_path, self.date, self.next_index);

        self.storage
            .put_object(&key, encoded.bytes, PARQUET_CONTENT_TYPE)
            .await
            .map_err(|e| DataFetchError::Sink(format!("{e:#}")))?;

        debug!(key = %key, chunk = self.next_index, rows = encoded.rows, "Chunk uploaded");
        self.next_index += 1;
        self.rows += encoded.rows;
        self.keys.push(key);
        Ok(())
    }
}
