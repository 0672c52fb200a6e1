//! Native value types for destination-bound rows.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Type hint for NULL values to ensure correct destination encoding.
///
/// When encoding NULL values in the binary COPY protocol or as statement
/// parameters, the expected column type must be known to emit the correct
/// wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PgNullType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Text,
    Bytes,
    Uuid,
    Decimal,
    Money,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
}

/// Destination value enum for type-safe row handling.
///
/// One variant per native representation the driver can carry. A cell
/// reported as NULL by the row source becomes `Null` with a type hint,
/// never a zero/empty sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue {
    /// NULL with type hint for correct wire format encoding.
    Null(PgNullType),

    /// Boolean value.
    Bool(bool),

    /// 16-bit signed integer (smallint).
    I16(i16),

    /// 32-bit signed integer (integer).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 32-bit floating point (real).
    F32(f32),

    /// 64-bit floating point (double precision).
    F64(f64),

    /// Character data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID/GUID value.
    Uuid(Uuid),

    /// Exact numeric with arbitrary precision.
    Decimal(Decimal),

    /// Currency amount in hundredths, the money wire representation.
    Money(i64),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),

    /// Time of day with a fixed zone offset.
    TimeTz(NaiveTime, FixedOffset),

    /// Timestamp without timezone.
    Timestamp(NaiveDateTime),

    /// Timestamp with timezone offset.
    TimestampTz(DateTime<FixedOffset>),
}

impl PgValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, PgValue::Null(_))
    }

    /// Get the PgNullType for this value (for type-aware NULL encoding).
    #[must_use]
    pub fn null_type(&self) -> PgNullType {
        match self {
            PgValue::Null(t) => *t,
            PgValue::Bool(_) => PgNullType::Bool,
            PgValue::I16(_) => PgNullType::I16,
            PgValue::I32(_) => PgNullType::I32,
            PgValue::I64(_) => PgNullType::I64,
            PgValue::F32(_) => PgNullType::F32,
            PgValue::F64(_) => PgNullType::F64,
            PgValue::Text(_) => PgNullType::Text,
            PgValue::Bytes(_) => PgNullType::Bytes,
            PgValue::Uuid(_) => PgNullType::Uuid,
            PgValue::Decimal(_) => PgNullType::Decimal,
            PgValue::Money(_) => PgNullType::Money,
            PgValue::Date(_) => PgNullType::Date,
            PgValue::Time(_) => PgNullType::Time,
            PgValue::TimeTz(_, _) => PgNullType::TimeTz,
            PgValue::Timestamp(_) => PgNullType::Timestamp,
            PgValue::TimestampTz(_) => PgNullType::TimestampTz,
        }
    }
}

impl From<bool> for PgValue {
    fn from(v: bool) -> Self {
        PgValue::Bool(v)
    }
}

impl From<i16> for PgValue {
    fn from(v: i16) -> Self {
        PgValue::I16(v)
    }
}

impl From<i32> for PgValue {
    fn from(v: i32) -> Self {
        PgValue::I32(v)
    }
}

impl From<i64> for PgValue {
    fn from(v: i64) -> Self {
        PgValue::I64(v)
    }
}

impl From<f32> for PgValue {
    fn from(v: f32) -> Self {
        PgValue::F32(v)
    }
}

impl From<f64> for PgValue {
    fn from(v: f64) -> Self {
        PgValue::F64(v)
    }
}

impl From<String> for PgValue {
    fn from(v: String) -> Self {
        PgValue::Text(v)
    }
}

impl From<&str> for PgValue {
    fn from(v: &str) -> Self {
        PgValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for PgValue {
    fn from(v: Vec<u8>) -> Self {
        PgValue::Bytes(v)
    }
}

impl From<Uuid> for PgValue {
    fn from(v: Uuid) -> Self {
        PgValue::Uuid(v)
    }
}

impl From<Decimal> for PgValue {
    fn from(v: Decimal) -> Self {
        PgValue::Decimal(v)
    }
}

impl From<NaiveDate> for PgValue {
    fn from(v: NaiveDate) -> Self {
        PgValue::Date(v)
    }
}

impl From<NaiveTime> for PgValue {
    fn from(v: NaiveTime) -> Self {
        PgValue::Time(v)
    }
}

impl From<NaiveDateTime> for PgValue {
    fn from(v: NaiveDateTime) -> Self {
        PgValue::Timestamp(v)
    }
}

impl From<DateTime<FixedOffset>> for PgValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        PgValue::TimestampTz(v)
    }
}
