//! Row-source collaborator interface.
//!
//! The upstream pipeline engine delivers rows through a fixed-layout buffer
//! with typed per-slot accessors, plus a column layout declared once per
//! session before the first row. The loader never assumes anything about the
//! buffer's column order; it binds by stable external identity (see
//! [`crate::bind`]).

pub mod memory;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Result;
use crate::schema::LogicalType;

/// One contiguous batch of rows with a fixed column layout.
///
/// Accessors take the buffer slot recorded in the session's bindings. A
/// mismatched accessor for a slot's actual type is a row-source error.
/// Large-object cells are read through [`RowBuffer::get_blob`] rather than a
/// fixed-size accessor.
pub trait RowBuffer {
    /// Advance to the next row. Returns false at end of batch.
    fn next_row(&mut self) -> Result<bool>;

    /// Whether the cell at `slot` is NULL in the current row.
    fn is_null(&self, slot: usize) -> Result<bool>;

    fn get_bool(&self, slot: usize) -> Result<bool>;
    fn get_i8(&self, slot: usize) -> Result<i8>;
    fn get_u8(&self, slot: usize) -> Result<u8>;
    fn get_i16(&self, slot: usize) -> Result<i16>;
    fn get_u16(&self, slot: usize) -> Result<u16>;
    fn get_i32(&self, slot: usize) -> Result<i32>;
    fn get_u32(&self, slot: usize) -> Result<u32>;
    fn get_i64(&self, slot: usize) -> Result<i64>;
    fn get_u64(&self, slot: usize) -> Result<u64>;
    fn get_f32(&self, slot: usize) -> Result<f32>;
    fn get_f64(&self, slot: usize) -> Result<f64>;
    fn get_decimal(&self, slot: usize) -> Result<Decimal>;
    fn get_str(&self, slot: usize) -> Result<String>;
    fn get_bytes(&self, slot: usize) -> Result<Vec<u8>>;

    /// Read an unbounded large-object cell in full.
    fn get_blob(&self, slot: usize) -> Result<Vec<u8>>;

    fn get_date(&self, slot: usize) -> Result<NaiveDate>;
    fn get_time(&self, slot: usize) -> Result<NaiveTime>;
    fn get_time_tz(&self, slot: usize) -> Result<(NaiveTime, FixedOffset)>;
    fn get_timestamp(&self, slot: usize) -> Result<NaiveDateTime>;
    fn get_timestamp_tz(&self, slot: usize) -> Result<DateTime<FixedOffset>>;
    fn get_uuid(&self, slot: usize) -> Result<Uuid>;
}

/// One column of the row source's declared layout.
#[derive(Debug, Clone)]
pub struct InputColumn {
    /// Display name in the source layout. Volatile; never used for binding.
    pub name: String,

    /// Stable destination-column identity mapped at design time.
    pub external_name: String,

    /// Index into the fixed-layout row buffer.
    pub slot: usize,

    /// Logical type of the cell at this slot.
    pub logical_type: LogicalType,

    /// Declared length for text/binary columns (0 when not applicable).
    pub length: i32,

    /// Declared numeric precision (0 when not applicable).
    pub precision: i32,

    /// Declared numeric scale (0 when not applicable).
    pub scale: i32,
}

impl InputColumn {
    /// Build an input column whose external identity equals its name, with
    /// no declared sizing. Covers the common case where the design-time
    /// mapping did not rename anything.
    pub fn simple(name: &str, slot: usize, logical_type: LogicalType) -> Self {
        Self {
            name: name.to_string(),
            external_name: name.to_string(),
            slot,
            logical_type,
            length: 0,
            precision: 0,
            scale: 0,
        }
    }
}

/// The row source's declared, fixed column layout for one session.
#[derive(Debug, Clone, Default)]
pub struct ColumnLayout {
    pub columns: Vec<InputColumn>,
}

impl ColumnLayout {
    pub fn new(columns: Vec<InputColumn>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
