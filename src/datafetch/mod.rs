mod error;
mod executor;
pub mod mock_executor;
mod native;
mod parquet_writer;
mod sink;
mod types;

pub use error::DataFetchError;
pub use executor::QueryExecutor;
pub use mock_executor::MockExecutor;
pub use native::{mysql_column_kind, pg_column_kind, ColumnKind, NativeExecutor};
pub use parquet_writer::{
    encode_batches, EncodedParquet, ParquetBufferWriter, PARQUET_CONTENT_TYPE,
};
pub use sink::{ChunkSink, CollectingSink};
pub use types::{ColumnMetadata, TableMetadata};
