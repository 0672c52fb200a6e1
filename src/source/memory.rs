//! In-memory row buffer.
//!
//! Owned row batches for embedding engines that assemble small batches in
//! memory, and for the test suite.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{LoadError, Result};
use crate::source::RowBuffer;

/// A typed cell in an in-memory row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Str(String),
    Bytes(Vec<u8>),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    TimeTz(NaiveTime, FixedOffset),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Uuid(Uuid),
}

/// Fixed-layout row batch held in memory.
///
/// The cursor starts before the first row; the first [`RowBuffer::next_row`]
/// positions it on row 0, matching the upstream engine's buffer contract.
#[derive(Debug, Clone)]
pub struct MemoryRows {
    rows: Vec<Vec<Cell>>,
    cursor: Option<usize>,
}

impl MemoryRows {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows, cursor: None }
    }

    fn cell(&self, slot: usize) -> Result<&Cell> {
        let row = self
            .cursor
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| LoadError::Source("no current row".to_string()))?;
        row.get(slot)
            .ok_or_else(|| LoadError::Source(format!("slot {} out of range", slot)))
    }

    fn mismatch(slot: usize, wanted: &str, got: &Cell) -> LoadError {
        LoadError::Source(format!(
            "slot {}: expected {}, buffer holds {:?}",
            slot, wanted, got
        ))
    }
}

impl RowBuffer for MemoryRows {
    fn next_row(&mut self) -> Result<bool> {
        let next = match self.cursor {
            None => 0,
            Some(i) => i + 1,
        };
        if next < self.rows.len() {
            self.cursor = Some(next);
            Ok(true)
        } else {
            self.cursor = Some(self.rows.len());
            Ok(false)
        }
    }

    fn is_null(&self, slot: usize) -> Result<bool> {
        Ok(matches!(self.cell(slot)?, Cell::Null))
    }

    fn get_bool(&self, slot: usize) -> Result<bool> {
        match self.cell(slot)? {
            Cell::Bool(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "bool", other)),
        }
    }

    fn get_i8(&self, slot: usize) -> Result<i8> {
        match self.cell(slot)? {
            Cell::I8(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "i8", other)),
        }
    }

    fn get_u8(&self, slot: usize) -> Result<u8> {
        match self.cell(slot)? {
            Cell::U8(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "u8", other)),
        }
    }

    fn get_i16(&self, slot: usize) -> Result<i16> {
        match self.cell(slot)? {
            Cell::I16(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "i16", other)),
        }
    }

    fn get_u16(&self, slot: usize) -> Result<u16> {
        match self.cell(slot)? {
            Cell::U16(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "u16", other)),
        }
    }

    fn get_i32(&self, slot: usize) -> Result<i32> {
        match self.cell(slot)? {
            Cell::I32(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "i32", other)),
        }
    }

    fn get_u32(&self, slot: usize) -> Result<u32> {
        match self.cell(slot)? {
            Cell::U32(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "u32", other)),
        }
    }

    fn get_i64(&self, slot: usize) -> Result<i64> {
        match self.cell(slot)? {
            Cell::I64(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "i64", other)),
        }
    }

    fn get_u64(&self, slot: usize) -> Result<u64> {
        match self.cell(slot)? {
            Cell::U64(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "u64", other)),
        }
    }

    fn get_f32(&self, slot: usize) -> Result<f32> {
        match self.cell(slot)? {
            Cell::F32(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "f32", other)),
        }
    }

    fn get_f64(&self, slot: usize) -> Result<f64> {
        match self.cell(slot)? {
            Cell::F64(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "f64", other)),
        }
    }

    fn get_decimal(&self, slot: usize) -> Result<Decimal> {
        match self.cell(slot)? {
            Cell::Decimal(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "decimal", other)),
        }
    }

    fn get_str(&self, slot: usize) -> Result<String> {
        match self.cell(slot)? {
            Cell::Str(v) => Ok(v.clone()),
            other => Err(Self::mismatch(slot, "str", other)),
        }
    }

    fn get_bytes(&self, slot: usize) -> Result<Vec<u8>> {
        match self.cell(slot)? {
            Cell::Bytes(v) => Ok(v.clone()),
            other => Err(Self::mismatch(slot, "bytes", other)),
        }
    }

    fn get_blob(&self, slot: usize) -> Result<Vec<u8>> {
        match self.cell(slot)? {
            Cell::Blob(v) => Ok(v.clone()),
            // Bounded cells can always be read through the blob path.
            Cell::Bytes(v) => Ok(v.clone()),
            Cell::Str(v) => Ok(v.clone().into_bytes()),
            other => Err(Self::mismatch(slot, "blob", other)),
        }
    }

    fn get_date(&self, slot: usize) -> Result<NaiveDate> {
        match self.cell(slot)? {
            Cell::Date(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "date", other)),
        }
    }

    fn get_time(&self, slot: usize) -> Result<NaiveTime> {
        match self.cell(slot)? {
            Cell::Time(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "time", other)),
        }
    }

    fn get_time_tz(&self, slot: usize) -> Result<(NaiveTime, FixedOffset)> {
        match self.cell(slot)? {
            Cell::TimeTz(t, off) => Ok((*t, *off)),
            other => Err(Self::mismatch(slot, "timetz", other)),
        }
    }

    fn get_timestamp(&self, slot: usize) -> Result<NaiveDateTime> {
        match self.cell(slot)? {
            Cell::Timestamp(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "timestamp", other)),
        }
    }

    fn get_timestamp_tz(&self, slot: usize) -> Result<DateTime<FixedOffset>> {
        match self.cell(slot)? {
            Cell::TimestampTz(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "timestamptz", other)),
        }
    }

    fn get_uuid(&self, slot: usize) -> Result<Uuid> {
        match self.cell(slot)? {
            Cell::Uuid(v) => Ok(*v),
            other => Err(Self::mismatch(slot, "uuid", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_starts_before_first_row() {
        let mut rows = MemoryRows::new(vec![vec![Cell::I32(1)], vec![Cell::I32(2)]]);
        assert!(rows.cell(0).is_err());

        assert!(rows.next_row().unwrap());
        assert_eq!(rows.get_i32(0).unwrap(), 1);
        assert!(rows.next_row().unwrap());
        assert_eq!(rows.get_i32(0).unwrap(), 2);
        assert!(!rows.next_row().unwrap());
    }

    #[test]
    fn test_null_check() {
        let mut rows = MemoryRows::new(vec![vec![Cell::Null, Cell::I32(7)]]);
        rows.next_row().unwrap();
        assert!(rows.is_null(0).unwrap());
        assert!(!rows.is_null(1).unwrap());
    }

    #[test]
    fn test_type_mismatch_is_source_error() {
        let mut rows = MemoryRows::new(vec![vec![Cell::Str("x".into())]]);
        rows.next_row().unwrap();
        let err = rows.get_i32(0).unwrap_err();
        assert!(matches!(err, LoadError::Source(_)));
    }

    #[test]
    fn test_blob_reads_bounded_cells() {
        let mut rows = MemoryRows::new(vec![vec![Cell::Str("abc".into())]]);
        rows.next_row().unwrap();
        assert_eq!(rows.get_blob(0).unwrap(), b"abc".to_vec());
    }
}
