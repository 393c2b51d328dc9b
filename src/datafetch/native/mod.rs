mod arrow_convert;
mod mysql;
mod postgres;

pub use arrow_convert::ColumnKind;
pub use mysql::mysql_column_kind;
pub use postgres::pg_column_kind;

use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use sqlx::postgres::PgPool;
use tracing::info;

use crate::datafetch::{ChunkSink, DataFetchError, QueryExecutor, TableMetadata};
use crate::source::Source;

#[derive(Debug)]
enum NativePool {
    Postgres(PgPool),
    Mysql { pool: MySqlPool, database: String },
}

/// Native Rust driver-based query executor.
///
/// Holds one pool for the whole run; call [`NativeExecutor::close`] once the
/// run is finished.
#[derive(Debug)]
pub struct NativeExecutor {
    pool: NativePool,
}

impl NativeExecutor {
    pub async fn connect(source: &Source) -> Result<Self, DataFetchError> {
        let pool = match source {
            Source::Postgres {
                host,
                port,
                user,
                password,
                database,
                ..
            } => {
                let pool = postgres::connect(host, *port, user, password, database).await?;
                NativePool::Postgres(pool)
            }
            Source::Mysql {
                host,
                port,
                user,
                password,
                database,
            } => NativePool::Mysql {
                pool: mysql::connect(host, *port, user, password, database).await?,
                database: database.clone(),
            },
        };

        info!(
            source_type = source.source_type(),
            database = source.database(),
            "Connected to source database"
        );
        Ok(Self { pool })
    }

    /// Release the connection pool.
    pub async fn close(&self) {
        match &self.pool {
            NativePool::Postgres(pool) => pool.close().await,
            NativePool::Mysql { pool, .. } => pool.close().await,
        }
        info!("Source connection closed");
    }
}

#[async_trait]
impl QueryExecutor for NativeExecutor {
    async fn discover_tables(
        &self,
        schema_filter: Option<&str>,
    ) -> Result<Vec<TableMetadata>, DataFetchError> {
        match &self.pool {
            NativePool::Postgres(pool) => postgres::discover_tables(pool, schema_filter).await,
            NativePool::Mysql { pool, database } => {
                mysql::discover_tables(pool, schema_filter.unwrap_or(database)).await
            }
        }
    }

    async fn fetch(
        &self,
        sql: &str,
        chunk_size: Option<usize>,
        sink: &mut dyn ChunkSink,
    ) -> Result<(), DataFetchError> {
        match &self.pool {
            NativePool::Postgres(pool) => postgres::fetch(pool, sql, chunk_size, sink).await,
            NativePool::Mysql { pool, .. } => mysql::fetch(pool, sql, chunk_size, sink).await,
        }
    }
}
