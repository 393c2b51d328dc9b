//! PostgreSQL native driver implementation using sqlx

use bigdecimal::BigDecimal;
use datafusion::arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Float32Array, Float64Array, Int16Array,
    Int32Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use datafusion::arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use sqlx::postgres::{
    PgColumn, PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgTypeKind, PgValueFormat,
};
use sqlx::{Column, Decode, Postgres, Row, Type, TypeInfo, ValueRef};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::datafetch::types::push_column;
use crate::datafetch::{ChunkSink, ColumnMetadata, DataFetchError, TableMetadata};

use super::arrow_convert::{days_since_epoch, ColumnKind, ResultShape};

/// Open the pool shared by every query of the run.
/// A single connection: the run is strictly sequential.
pub async fn connect(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    database: &str,
) -> Result<PgPool, DataFetchError> {
    let options = PgConnectOptions::new()
        .host(host)
        .port(port)
        .username(user)
        .password(password)
        .database(database);

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Discover base tables and their columns.
///
/// Without a filter every schema is inspected except `information_schema` and
/// the `pg_*` system schemas.
pub async fn discover_tables(
    pool: &PgPool,
    schema_filter: Option<&str>,
) -> Result<Vec<TableMetadata>, DataFetchError> {
    let rows = sqlx::query(
        r#"
        SELECT
            t.table_catalog::text,
            t.table_schema::text,
            t.table_name::text,
            c.column_name::text,
            c.data_type::text,
            c.is_nullable::text,
            c.ordinal_position::int
        FROM information_schema.tables t
        JOIN information_schema.columns c
            ON t.table_catalog = c.table_catalog
            AND t.table_schema = c.table_schema
            AND t.table_name = c.table_name
        WHERE t.table_type = 'BASE TABLE'
            AND (
                ($1::text IS NULL
                    AND t.table_schema <> 'information_schema'
                    AND t.table_schema NOT LIKE 'pg\_%')
                OR t.table_schema = $1::text
            )
        ORDER BY t.table_schema, t.table_name, c.ordinal_position
        "#,
    )
    .bind(schema_filter)
    .fetch_all(pool)
    .await
    .map_err(|e| DataFetchError::Discovery(e.to_string()))?;

    let mut tables: Vec<TableMetadata> = Vec::new();

    for row in rows {
        let catalog: Option<String> = row.try_get(0)?;
        let schema: String = row.try_get(1)?;
        let table: String = row.try_get(2)?;
        let column = ColumnMetadata {
            name: row.try_get(3)?,
            data_type: row.try_get(4)?,
            nullable: row.try_get::<String, _>(5)?.eq_ignore_ascii_case("YES"),
            ordinal_position: row.try_get(6)?,
        };

        push_column(&mut tables, catalog, schema, table, column);
    }

    debug!(tables = tables.len(), "Discovered PostgreSQL tables");
    Ok(tables)
}

/// Stream the result of `sql` to `sink` in chunks of at most `chunk_size` rows.
pub async fn fetch(
    pool: &PgPool,
    sql: &str,
    chunk_size: Option<usize>,
    sink: &mut dyn ChunkSink,
) -> Result<(), DataFetchError> {
    let mut stream = sqlx::query(sql).fetch(pool);
    let mut shape: Option<ResultShape> = None;
    let mut pending: Vec<PgRow> = Vec::with_capacity(chunk_size.unwrap_or_default());

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

fn shape_from_columns(columns: &[PgColumn]) -> ResultShape {
    ResultShape::new(
        columns
            .iter()
            .map(|col| (col.name(), column_kind(col))),
    )
}

fn column_kind(column: &PgColumn) -> ColumnKind {
    let type_info = column.type_info();
    match type_info.kind() {
        PgTypeKind::Enum(_) => ColumnKind::Enum,
        _ => pg_column_kind(type_info.name()),
    }
}

/// Map a PostgreSQL type name to the kind it is decoded as.
pub fn pg_column_kind(pg_type: &str) -> ColumnKind {
    match pg_type.to_lowercase().as_str() {
        "bool" | "boolean" => ColumnKind::Boolean,
        "int2" | "smallint" => ColumnKind::Int16,
        "int4" | "int" | "integer" => ColumnKind::Int32,
        "int8" | "bigint" => ColumnKind::Int64,
        "float4" | "real" => ColumnKind::Float32,
        "float8" | "double precision" => ColumnKind::Float64,
        "numeric" | "decimal" => ColumnKind::Decimal,
        "varchar" | "character varying" | "text" | "bpchar" | "character" | "char"
        | "\"char\"" | "name" | "citext" => ColumnKind::Text,
        "bytea" => ColumnKind::Binary,
        "date" => ColumnKind::Date,
        "time" | "time without time zone" => ColumnKind::Time,
        "timestamp" | "timestamp without time zone" => ColumnKind::Timestamp,
        "timestamptz" | "timestamp with time zone" => ColumnKind::TimestampTz,
        "uuid" => ColumnKind::Uuid,
        "json" | "jsonb" => ColumnKind::Json,
        _ => ColumnKind::Raw,
    }
}

/// Decode one column across `rows`. Values the driver cannot decode as `T`
/// are logged and stored as null.
fn column_values<T>(rows: &[PgRow], idx: usize) -> Result<Vec<Option<T>>, DataFetchError>
where
    T: for<'r> Decode<'r, Postgres> + Type<Postgres>,
{
    rows.iter()
        .map(|row| match row.try_get::<Option<T>, _>(idx) {
            Ok(value) => Ok(value),
            Err(sqlx::Error::ColumnDecode { index, source }) => {
                warn!(column = %index, error = %source, "Undecodable PostgreSQL value stored as null");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        })
        .collect()
}

const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_POS_INF: u16 = 0xD000;
const NUMERIC_NEG_INF: u16 = 0xF000;

/// Sign word and display scale from the header of a binary NUMERIC value
/// (ndigits, weight, sign, dscale: four big-endian 16-bit words).
fn numeric_header(bytes: &[u8]) -> Option<(u16, u16)> {
    match bytes {
        [_, _, _, _, s0, s1, d0, d1, ..] => {
            Some((u16::from_be_bytes([*s0, *s1]), u16::from_be_bytes([*d0, *d1])))
        }
        _ => None,
    }
}

fn special_numeric(sign: u16) -> Option<&'static str> {
    match sign {
        NUMERIC_NAN => Some("NaN"),
        NUMERIC_POS_INF => Some("Infinity"),
        NUMERIC_NEG_INF => Some("-Infinity"),
        _ => None,
    }
}

/// NUMERIC rendered the way PostgreSQL prints it: full precision, the
/// column's display scale, and `NaN`/`Infinity` kept as text.
fn numeric_text(row: &PgRow, idx: usize) -> Result<Option<String>, DataFetchError> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(None);
    }
    if matches!(raw.format(), PgValueFormat::Text) {
        return Ok(raw.as_str().ok().map(str::to_string));
    }

    let header = raw.as_bytes().ok().and_then(numeric_header);
    let Some((sign, dscale)) = header else {
        warn!(column = idx, "Malformed PostgreSQL numeric stored as null");
        return Ok(None);
    };
    if let Some(special) = special_numeric(sign) {
        return Ok(Some(special.to_string()));
    }

    match row.try_get::<BigDecimal, _>(idx) {
        Ok(value) => Ok(Some(value.with_scale(i64::from(dscale)).to_plain_string())),
        Err(sqlx::Error::ColumnDecode { index, source }) => {
            warn!(column = %index, error = %source, "Undecodable PostgreSQL numeric stored as null");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Enum labels travel as UTF-8 text, so they are read without the type check
/// that rejects user-defined types.
fn enum_labels(rows: &[PgRow], idx: usize) -> Result<Vec<Option<String>>, DataFetchError> {
    rows.iter()
        .map(|row| match row.try_get_unchecked::<Option<String>, _>(idx) {
            Ok(value) => Ok(value),
            Err(sqlx::Error::ColumnDecode { index, source }) => {
                warn!(column = %index, error = %source, "Undecodable PostgreSQL enum stored as null");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        })
        .collect()
}

/// Undecoded value bytes, for types with no Arrow counterpart.
fn raw_values(rows: &[PgRow], idx: usize) -> Result<Vec<Option<Vec<u8>>>, DataFetchError> {
    rows.iter()
        .map(|row| -> Result<Option<Vec<u8>>, DataFetchError> {
            let raw = row.try_get_raw(idx)?;
            if raw.is_null() {
                return Ok(None);
            }
            let bytes = raw
                .as_bytes()
                .map_err(|e| DataFetchError::Query(format!("column {idx}: {e}")))?;
            Ok(Some(bytes.to_vec()))
        })
        .collect()
}

fn column_to_array(rows: &[PgRow], idx: usize, kind: ColumnKind) -> Result<ArrayRef, DataFetchError> {
    let array: ArrayRef = match kind {
        ColumnKind::Boolean => Arc::new(BooleanArray::from(column_values::<bool>(rows, idx)?)),
        ColumnKind::Int16 => Arc::new(Int16Array::from(column_values::<i16>(rows, idx)?)),
        ColumnKind::Int32 => Arc::new(Int32Array::from(column_values::<i32>(rows, idx)?)),
        ColumnKind::Int64 => Arc::new(Int64Array::from(column_values::<i64>(rows, idx)?)),
        ColumnKind::Float32 => Arc::new(Float32Array::from(column_values::<f32>(rows, idx)?)),
        ColumnKind::Float64 => Arc::new(Float64Array::from(column_values::<f64>(rows, idx)?)),
        ColumnKind::Decimal => Arc::new(
            rows.iter()
                .map(|row| numeric_text(row, idx))
                .collect::<Result<StringArray, _>>()?,
        ),
        ColumnKind::Binary => {
            let values = column_values::<Vec<u8>>(rows, idx)?;
            Arc::new(values.iter().map(|v| v.as_deref()).collect::<BinaryArray>())
        }
        ColumnKind::Raw => {
            let values = raw_values(rows, idx)?;
            Arc::new(values.iter().map(|v| v.as_deref()).collect::<BinaryArray>())
        }
        ColumnKind::Enum => Arc::new(StringArray::from(enum_labels(rows, idx)?)),
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
        ColumnKind::Uuid => Arc::new(display_array(column_values::<sqlx::types::Uuid>(rows, idx)?)),
        ColumnKind::Json => Arc::new(display_array(column_values::<sqlx::types::JsonValue>(
            rows, idx,
        )?)),
        // PostgreSQL has no 1-byte or unsigned integers; remaining kinds read as text
        ColumnKind::Int8
        | ColumnKind::UInt8
        | ColumnKind::UInt16
        | ColumnKind::UInt32
        | ColumnKind::UInt64
        | ColumnKind::Text
        | ColumnKind::Other => Arc::new(StringArray::from(column_values::<String>(rows, idx)?)),
    };
    Ok(array)
}

fn display_array<T: ToString>(values: Vec<Option<T>>) -> StringArray {
    values
        .into_iter()
        .map(|v| v.map(|v| v.to_string()))
        .collect()
}

/// Build a RecordBatch from PostgreSQL rows
fn rows_to_batch(rows: &[PgRow], shape: &ResultShape) -> Result<RecordBatch, DataFetchError> {
    let arrays = shape
        .kinds
        .iter()
        .enumerate()
        .map(|(idx, kind)| column_to_array(rows, idx, *kind))
        .collect::<Result<Vec<_>, _>>()?;

    RecordBatch::try_new(shape.schema.clone(), arrays)
        .map_err(|e| DataFetchError::Query(e.to_string()))
}
