use async_trait::async_trait;
use datafusion::arrow::record_batch::RecordBatch;

use super::DataFetchError;

/// Consumer of the chunks produced by a [`QueryExecutor`](super::QueryExecutor).
///
/// The executor calls `write_chunk` once per chunk, in emission order, and
/// awaits each call before reading further rows. Returning an error stops the
/// read and the error is propagated to the caller of `fetch`.
#[async_trait]
pub trait ChunkSink: Send {
    async fn write_chunk(&mut self, chunk: RecordBatch) -> Result<(), DataFetchError>;
}

/// A sink that collects all chunks in memory.
/// Used for unchunked reads whose result is processed as a whole.
#[derive(Debug, Default)]
pub struct CollectingSink {
    chunks: Vec<RecordBatch>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total row count across all chunks.
    pub fn row_count(&self) -> usize {
        self.chunks.iter().map(|c| c.num_rows()).sum()
    }

    /// Consume this sink and return the collected chunks.
    pub fn into_chunks(self) -> Vec<RecordBatch> {
        self.chunks
    }
}

#[async_trait]
impl ChunkSink for CollectingSink {
    async fn write_chunk(&mut self, chunk: RecordBatch) -> Result<(), DataFetchError> {
        self.chunks.push(chunk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::Int32Array;
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_collecting_sink() {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, false)]));

        let mut sink = CollectingSink::new();
        let batch1 =
            RecordBatch::try_new(schema.clone(), vec![Arc::new(Int32Array::from(vec![1, 2, 3]))])
                .unwrap();
        let batch2 =
            RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![4, 5]))]).unwrap();

        sink.write_chunk(batch1).await.unwrap();
        sink.write_chunk(batch2).await.unwrap();

        assert_eq!(sink.row_count(), 5);
        assert_eq!(sink.into_chunks().len(), 2);
    }
}
