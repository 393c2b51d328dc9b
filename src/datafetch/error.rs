//! Error types for data fetching operations

use thiserror::Error;

/// Errors that can occur while inspecting or reading from the source database
#[derive(Debug, Error)]
pub enum DataFetchError {
    /// Failed to establish connection to the source database
    #[error("connection failed: {0}")]
    Connection(String),

    /// Query execution or row decoding failed
    #[error("query failed: {0}")]
    Query(String),

    /// Failed to discover schemas, tables or columns
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// Failed to encode a chunk into Parquet
    #[error("encode failed: {0}")]
    Encode(String),

    /// The chunk consumer rejected a chunk (e.g. an upload failed)
    #[error("chunk sink failed: {0}")]
    Sink(String),
}

impl From<sqlx::Error> for DataFetchError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Configuration(_) => DataFetchError::Connection(e.to_string()),
            sqlx::Error::Database(_) => DataFetchError::Query(e.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
                DataFetchError::Connection(e.to_string())
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_) => DataFetchError::Query(e.to_string()),
            _ => DataFetchError::Connection(e.to_string()),
        }
    }
}

impl From<datafusion::arrow::error::ArrowError> for DataFetchError {
    fn from(e: datafusion::arrow::error::ArrowError) -> Self {
        DataFetchError::Encode(e.to_string())
    }
}

impl From<datafusion::parquet::errors::ParquetError> for DataFetchError {
    fn from(e: datafusion::parquet::errors::ParquetError) -> Self {
        DataFetchError::Encode(e.to_string())
    }
}
