//! In-memory Parquet encoding of fetched chunks

use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::parquet::arrow::ArrowWriter;
use datafusion::parquet::basic::Compression;
use datafusion::parquet::file::properties::{WriterProperties, WriterVersion};

use crate::datafetch::DataFetchError;

/// MIME type attached to every uploaded object.
pub const PARQUET_CONTENT_TYPE: &str = "application/vnd.apache.parquet";

const MAX_ROW_GROUP_SIZE: usize = 100_000;

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_writer_version(WriterVersion::PARQUET_2_0)
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(MAX_ROW_GROUP_SIZE)
        .build()
}

/// A finished Parquet object, ready for upload.
#[derive(Debug, Clone)]
pub struct EncodedParquet {
    pub bytes: Vec<u8>,
    pub rows: usize,
}

/// Parquet writer backed by an in-memory buffer.
///
/// Lifecycle: try_new(schema) -> write_batch()* -> finish()
pub struct ParquetBufferWriter {
    writer: ArrowWriter<Vec<u8>>,
    row_count: usize,
}

impl ParquetBufferWriter {
    pub fn try_new(schema: SchemaRef) -> Result<Self, DataFetchError> {
        let writer = ArrowWriter::try_new(Vec::new(), schema, Some(writer_properties()))?;
        Ok(Self {
            writer,
            row_count: 0,
        })
    }

    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), DataFetchError> {
        self.row_count += batch.num_rows();
        self.writer.write(batch)?;
        Ok(())
    }

    /// Write the footer and return the encoded bytes.
    pub fn finish(self) -> Result<EncodedParquet, DataFetchError> {
        let bytes = self.writer.into_inner()?;
        Ok(EncodedParquet {
            bytes,
            rows: self.row_count,
        })
    }
}

/// Encode one or more batches sharing a schema into a single Parquet buffer.
pub fn encode_batches(batches: &[RecordBatch]) -> Result<EncodedParquet, DataFetchError> {
    let first = batches
        .first()
        .ok_or_else(|| DataFetchError::Encode("no batches to encode".into()))?;

    let mut writer = ParquetBufferWriter::try_new(first.schema())?;
    for batch in batches {
        writer.write_batch(batch)?;
    }
    writer.finish()
}
