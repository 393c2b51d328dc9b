//! MySQL native driver implementation using sqlx

use bigdecimal::BigDecimal;
use datafusion::arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Float32Array, Float64Array, Int16Array,
    Int32Array, Int64Array, Int8Array, StringArray, TimestampMicrosecondArray,
};
use datafusion::arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlColumn, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Decode, MySql, Row, Type, TypeInfo};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::datafetch::types::push_column;
use crate::datafetch::{ChunkSink, ColumnMetadata, DataFetchError, TableMetadata};

use super::arrow_convert::{days_since_epoch, ColumnKind, ResultShape};

/// Open the pool shared by every query of the run.
/// Uses MySqlConnectOptions to avoid embedding credentials in a URL string.
pub async fn connect(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    database: &str,
) -> Result<MySqlPool, DataFetchError> {
    let options = MySqlConnectOptions::new()
        .host(host)
        .port(port)
        .username(user)
        .password(password)
        .database(database);

    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Discover base tables and their columns in one database.
///
/// MySQL reports `def` as the catalog of every table, so no catalog name is
/// recorded and tables are always addressed as `database.table`.
pub async fn discover_tables(
    pool: &MySqlPool,
    database: &str,
) -> Result<Vec<TableMetadata>, DataFetchError> {
    let rows = sqlx::query(
        r#"
        SELECT
            CAST(t.TABLE_SCHEMA AS CHAR(64)) AS TABLE_SCHEMA,
            CAST(t.TABLE_NAME AS CHAR(64)) AS TABLE_NAME,
            CAST(c.COLUMN_NAME AS CHAR(64)) AS COLUMN_NAME,
            CAST(c.COLUMN_TYPE AS CHAR(255)) AS COLUMN_TYPE,
            CAST(c.IS_NULLABLE AS CHAR(3)) AS IS_NULLABLE,
            CAST(c.ORDINAL_POSITION AS SIGNED) AS ORDINAL_POSITION
        FROM information_schema.TABLES t
        JOIN information_schema.COLUMNS c
            ON t.TABLE_SCHEMA = c.TABLE_SCHEMA
            AND t.TABLE_NAME = c.TABLE_NAME
        WHERE t.TABLE_SCHEMA = ?
            AND t.TABLE_TYPE = 'BASE TABLE'
        ORDER BY t.TABLE_SCHEMA, t.TABLE_NAME, c.ORDINAL_POSITION
        "#,
    )
    .bind(database)
    .fetch_all(pool)
    .await
    .map_err(|e| DataFetchError::Discovery(e.to_string()))?;

    let mut tables: Vec<TableMetadata> = Vec::new();

    for row in rows {
        let schema: String = row.try_get(0)?;
        let table: String = row.try_get(1)?;
        let ordinal: i64 = row.try_get(5)?;
        let column = ColumnMetadata {
            name: row.try_get(2)?,
            data_type: row.try_get(3)?,
            nullable: row.try_get::<String, _>(4)?.eq_ignore_ascii_case("YES"),
            ordinal_position: ordinal as i32,
        };

        push_column(&mut tables, None, schema, table, column);
    }

    debug!(database, tables = tables.len(), "Discovered MySQL tables");
    Ok(tables)
}

/// Stream the result of `sql` to `sink` in chunks of at most `chunk_size` rows.
pub async fn fetch(
    pool: &MySqlPool,
    sql: &str,
    chunk_size: Option<usize>,
    sink: &mut dyn ChunkSink,
) -> Result<(), DataFetchError> {
    let mut stream = sqlx::query(sql).fetch(pool);
    let mut shape: Option<ResultShape> = None;
    let mut pending: Vec<MySqlRow> = Vec::with_capacity(chunk_size.unwrap_or_default());

    while let Some(row) = stream.try_next().await? {
        let shape = shape.get_or_insert_with(|| shape_from_columns(row.columns()));
        pending.push(row);

        if chunk_size.is_some_and(|limit| pending.len() >= limit) {
            let chunk = rows_to_batch(&pending, shape)?;
            pending.clear();
            sink.write_chunk(chunk).await?;
        }
    }

    if let Some(shape) = shape.as_ref().filter(|_| !pending.is_empty()) {
        let chunk = rows_to_batch(&pending, shape)?;
        sink.write_chunk(chunk).await?;
    }

    Ok(())
}

fn shape_from_columns(columns: &[MySqlColumn]) -> ResultShape {
    ResultShape::new(
        columns
            .iter()
            .map(|col| (col.name(), mysql_column_kind(col.type_info().name()))),
    )
}

/// Map a MySQL type name (as reported by the driver, or a COLUMN_TYPE such as
/// `int(11) unsigned`) to the kind it is decoded as.
pub fn mysql_column_kind(mysql_type: &str) -> ColumnKind {
    let type_lower = mysql_type.to_lowercase();
    let is_unsigned = type_lower.contains("unsigned");

    // TINYINT(1) is conventionally used as boolean in MySQL
    if type_lower.starts_with("tinyint(1)") {
        return ColumnKind::Boolean;
    }

    let base_type = type_lower
        .split(['(', ' '])
        .next()
        .unwrap_or(type_lower.as_str());

    match base_type {
        "bool" | "boolean" => ColumnKind::Boolean,
        "tinyint" if is_unsigned => ColumnKind::UInt8,
        "tinyint" => ColumnKind::Int8,
        "smallint" if is_unsigned => ColumnKind::UInt16,
        "smallint" => ColumnKind::Int16,
        "mediumint" | "int" | "integer" if is_unsigned => ColumnKind::UInt32,
        "mediumint" | "int" | "integer" => ColumnKind::Int32,
        "bigint" if is_unsigned => ColumnKind::UInt64,
        "bigint" => ColumnKind::Int64,
        "float" => ColumnKind::Float32,
        "double" | "real" => ColumnKind::Float64,
        "decimal" | "numeric" | "dec" | "fixed" => ColumnKind::Decimal,
        "varchar" | "char" | "text" | "tinytext" | "mediumtext" | "longtext" | "enum" | "set" => {
            ColumnKind::Text
        }
        "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "bit" => {
            ColumnKind::Binary
        }
        "date" => ColumnKind::Date,
        "time" => ColumnKind::Time,
        "datetime" => ColumnKind::Timestamp,
        // MySQL TIMESTAMP is stored in UTC
        "timestamp" => ColumnKind::TimestampTz,
        "json" => ColumnKind::Json,
        _ => ColumnKind::Other,
    }
}

/// Decode one column across `rows`. Values the driver cannot decode as `T`
/// are logged and stored as null.
fn column_values<T>(rows: &[MySqlRow], idx: usize) -> Result<Vec<Option<T>>, DataFetchError>
where
    T: for<'r> Decode<'r, MySql> + Type<MySql>,
{
    rows.iter()
        .map(|row| match row.try_get::<Option<T>, _>(idx) {
            Ok(value) => Ok(value),
            Err(sqlx::Error::ColumnDecode { index, source }) => {
                warn!(column = %index, error = %source, "Undecodable MySQL value stored as null");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        })
        .collect()
}

/// Decode an unsigned column and widen it into the next signed type.
fn widened<T, W>(rows: &[MySqlRow], idx: usize) -> Result<Vec<Option<W>>, DataFetchError>
where
    T: for<'r> Decode<'r, MySql> + Type<MySql> + Into<W>,
{
    Ok(column_values::<T>(rows, idx)?
        .into_iter()
        .map(|v| v.map(Into::into))
        .collect())
}

fn column_to_array(
    rows: &[MySqlRow],
    idx: usize,
    kind: ColumnKind,
) -> Result<ArrayRef, DataFetchError> {
    let array: ArrayRef = match kind {
        ColumnKind::Boolean => Arc::new(BooleanArray::from(column_values::<bool>(rows, idx)?)),
        ColumnKind::Int8 => Arc::new(Int8Array::from(column_values::<i8>(rows, idx)?)),
        ColumnKind::Int16 => Arc::new(Int16Array::from(column_values::<i16>(rows, idx)?)),
        ColumnKind::Int32 => Arc::new(Int32Array::from(column_values::<i32>(rows, idx)?)),
        ColumnKind::Int64 => Arc::new(Int64Array::from(column_values::<i64>(rows, idx)?)),
        ColumnKind::UInt8 => Arc::new(Int16Array::from(widened::<u8, i16>(rows, idx)?)),
        ColumnKind::UInt16 => Arc::new(Int32Array::from(widened::<u16, i32>(rows, idx)?)),
        ColumnKind::UInt32 => Arc::new(Int64Array::from(widened::<u32, i64>(rows, idx)?)),
        ColumnKind::UInt64 => Arc::new(display_array(column_values::<u64>(rows, idx)?)),
        ColumnKind::Float32 => Arc::new(Float32Array::from(column_values::<f32>(rows, idx)?)),
        ColumnKind::Float64 => Arc::new(Float64Array::from(column_values::<f64>(rows, idx)?)),
        ColumnKind::Decimal => Arc::new(
            column_values::<BigDecimal>(rows, idx)?
                .into_iter()
                .map(|v| v.map(|d| d.to_plain_string()))
                .collect::<StringArray>(),
        ),
        ColumnKind::Binary | ColumnKind::Raw => {
            let values = column_values::<Vec<u8>>(rows, idx)?;
            Arc::new(values.iter().map(|v| v.as_deref()).collect::<BinaryArray>())
        }
        ColumnKind::Date => {
            let values = column_values::<chrono::NaiveDate>(rows, idx)?;
            Arc::new(Date32Array::from(
                values.into_iter().map(|v| v.map(days_since_epoch)).collect::<Vec<_>>(),
            ))
        }
        ColumnKind::Time => Arc::new(display_array(column_values::<chrono::NaiveTime>(rows, idx)?)),
        ColumnKind::Timestamp => {
            let values = column_values::<chrono::NaiveDateTime>(rows, idx)?;
            Arc::new(TimestampMicrosecondArray::from(
                values
                    .into_iter()
                    .map(|v| v.map(|ts| ts.and_utc().timestamp_micros()))
                    .collect::<Vec<_>>(),
            ))
        }
        ColumnKind::TimestampTz => {
            let values = column_values::<chrono::DateTime<chrono::Utc>>(rows, idx)?;
            Arc::new(
                TimestampMicrosecondArray::from(
                    values
                        .into_iter()
                        .map(|v| v.map(|ts| ts.timestamp_micros()))
                        .collect::<Vec<_>>(),
                )
                .with_timezone("UTC"),
            )
        }
        ColumnKind::Json => Arc::new(display_array(column_values::<sqlx::types::JsonValue>(
            rows, idx,
        )?)),
        ColumnKind::Uuid | ColumnKind::Text | ColumnKind::Enum | ColumnKind::Other => {
            Arc::new(StringArray::from(column_values::<String>(rows, idx)?))
        }
    };
    Ok(array)
}

fn display_array<T: ToString>(values: Vec<Option<T>>) -> StringArray {
    values
        .into_iter()
        .map(|v| v.map(|v| v.to_string()))
        .collect()
}

/// Build a RecordBatch from MySQL rows
fn rows_to_batch(rows: &[MySqlRow], shape: &ResultShape) -> Result<RecordBatch, DataFetchError> {
    let arrays = shape
        .kinds
        .iter()
        .enumerate()
        .map(|(idx, kind)| column_to_array(rows, idx, *kind))
        .collect::<Result<Vec<_>, _>>()?;

    RecordBatch::try_new(shape.schema.clone(), arrays)
        .map_err(|e| DataFetchError::Query(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_driver_type_names() {
        assert_eq!(mysql_column_kind("BOOLEAN"), ColumnKind::Boolean);
        assert_eq!(mysql_column_kind("TINYINT"), ColumnKind::Int8);
        assert_eq!(mysql_column_kind("TINYINT UNSIGNED"), ColumnKind::UInt8);
        assert_eq!(mysql_column_kind("INT"), ColumnKind::Int32);
        assert_eq!(mysql_column_kind("INT UNSIGNED"), ColumnKind::UInt32);
        assert_eq!(mysql_column_kind("BIGINT UNSIGNED"), ColumnKind::UInt64);
        assert_eq!(mysql_column_kind("DATETIME"), ColumnKind::Timestamp);
        assert_eq!(mysql_column_kind("TIMESTAMP"), ColumnKind::TimestampTz);
        assert_eq!(mysql_column_kind("VARCHAR"), ColumnKind::Text);
        assert_eq!(mysql_column_kind("BLOB"), ColumnKind::Binary);
    }

    #[test]
    fn test_mysql_column_type_strings() {
        assert_eq!(mysql_column_kind("tinyint(1)"), ColumnKind::Boolean);
        assert_eq!(mysql_column_kind("tinyint(4)"), ColumnKind::Int8);
        assert_eq!(mysql_column_kind("int(11) unsigned"), ColumnKind::UInt32);
        assert_eq!(mysql_column_kind("mediumint(8)"), ColumnKind::Int32);
        assert_eq!(mysql_column_kind("decimal(10,2)"), ColumnKind::Decimal);
        assert_eq!(mysql_column_kind("varchar(255)"), ColumnKind::Text);
        assert_eq!(mysql_column_kind("enum('a','b')"), ColumnKind::Text);
    }

    #[test]
    fn test_mysql_unknown_type_fallback() {
        assert_eq!(mysql_column_kind("geometry"), ColumnKind::Other);
        assert_eq!(mysql_column_kind("year"), ColumnKind::Other);
    }

    #[test]
    fn test_wide_decimal_text_is_preserved() {
        use std::str::FromStr;

        let text = "12345678901234567890123456789012345.123456789012345678901234567890";
        let value = BigDecimal::from_str(text).unwrap();
        assert_eq!(value.to_plain_string(), text);
    }
}
