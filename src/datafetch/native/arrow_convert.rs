//! Shared pieces of the row-to-Arrow conversion used by the native drivers.
//!
//! Each driver maps its own type names to a [`ColumnKind`]; the kind fixes both
//! the Rust type a value is decoded as and the Arrow type it is stored as.

use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    /// Unsigned integers widen to the next signed type
    UInt8,
    UInt16,
    UInt32,
    /// No wider signed type exists; stored as text to keep full precision
    UInt64,
    Float32,
    Float64,
    /// Stored as text to preserve precision and scale
    Decimal,
    Text,
    Binary,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
    /// User-defined enum; the label is stored as text
    Enum,
    /// A type with no Arrow counterpart, kept as the driver's raw value bytes
    Raw,
    /// Anything else is read as text, or null when the driver cannot decode it as text
    Other,
}

impl ColumnKind {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnKind::Boolean => DataType::Boolean,
            ColumnKind::Int8 => DataType::Int8,
            ColumnKind::Int16 | ColumnKind::UInt8 => DataType::Int16,
            ColumnKind::Int32 | ColumnKind::UInt16 => DataType::Int32,
            ColumnKind::Int64 | ColumnKind::UInt32 => DataType::Int64,
            ColumnKind::Float32 => DataType::Float32,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::Binary | ColumnKind::Raw => DataType::Binary,
            ColumnKind::Date => DataType::Date32,
            ColumnKind::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            ColumnKind::TimestampTz => {
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
            }
            ColumnKind::UInt64
            | ColumnKind::Decimal
            | ColumnKind::Text
            | ColumnKind::Time
            | ColumnKind::Uuid
            | ColumnKind::Json
            | ColumnKind::Enum
            | ColumnKind::Other => DataType::Utf8,
        }
    }
}

/// Column layout of a result set, captured from its first row.
#[derive(Debug, Clone)]
pub struct ResultShape {
    pub schema: SchemaRef,
    pub kinds: Vec<ColumnKind>,
}

impl ResultShape {
    /// Build from (column name, kind) pairs. Every field is nullable since
    /// result-set metadata does not carry nullability reliably.
    pub fn new<'a>(columns: impl IntoIterator<Item = (&'a str, ColumnKind)>) -> Self {
        let (fields, kinds): (Vec<Field>, Vec<ColumnKind>) = columns
            .into_iter()
            .map(|(name, kind)| (Field::new(name, kind.data_type(), true), kind))
            .unzip();

        Self {
            schema: Arc::new(Schema::new(fields)),
            kinds,
        }
    }
}

/// Days since the Unix epoch, as stored in Arrow `Date32`.
pub fn days_since_epoch(date: chrono::NaiveDate) -> i32 {
    (date - chrono::DateTime::UNIX_EPOCH.date_naive()).num_days() as i32
}
