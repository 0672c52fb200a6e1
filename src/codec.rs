//! Value extraction and destination encoding.
//!
//! The per-type dispatch lives here, in one place, so descriptor derivation
//! and value conversion cannot drift apart: [`extract`] reads a typed cell
//! from the row buffer by the source's logical type, and [`encode`] coerces
//! the extracted value into the destination column's native representation.
//! Both load strategies go through [`extract_row`].

use rust_decimal::{Decimal, RoundingStrategy};

use crate::bind::ColumnBinding;
use crate::error::{LoadError, Result};
use crate::schema::{ColumnDescriptor, LogicalType};
use crate::source::RowBuffer;
use crate::value::{PgNullType, PgValue};

/// NULL type hint for a logical type.
pub fn null_hint(logical: LogicalType) -> PgNullType {
    match logical {
        LogicalType::Bool => PgNullType::Bool,
        LogicalType::Int8 | LogicalType::UInt8 | LogicalType::Int16 => PgNullType::I16,
        LogicalType::UInt16 | LogicalType::Int32 => PgNullType::I32,
        LogicalType::UInt32 | LogicalType::Int64 | LogicalType::UInt64 => PgNullType::I64,
        LogicalType::Float32 => PgNullType::F32,
        LogicalType::Float64 => PgNullType::F64,
        LogicalType::Numeric => PgNullType::Decimal,
        LogicalType::Currency => PgNullType::Money,
        LogicalType::AnsiText
        | LogicalType::WideText
        | LogicalType::LargeAnsiText
        | LogicalType::LargeWideText => PgNullType::Text,
        LogicalType::Bytes | LogicalType::LargeBytes => PgNullType::Bytes,
        LogicalType::Date => PgNullType::Date,
        LogicalType::Time => PgNullType::Time,
        LogicalType::TimeTz => PgNullType::TimeTz,
        LogicalType::Timestamp => PgNullType::Timestamp,
        LogicalType::TimestampTz => PgNullType::TimestampTz,
        LogicalType::Uuid => PgNullType::Uuid,
    }
}

/// Read the cell at `slot` as a typed value.
///
/// A cell the source reports as NULL returns the null marker regardless of
/// logical type. Unsigned widths widen losslessly; an unsigned 64-bit value
/// above `i64::MAX` becomes a decimal rather than being truncated.
/// Large-object cells are read through the blob accessor.
pub fn extract(buffer: &dyn RowBuffer, slot: usize, logical: LogicalType) -> Result<PgValue> {
    if buffer.is_null(slot)? {
        return Ok(PgValue::Null(null_hint(logical)));
    }

    let value = match logical {
        LogicalType::Bool => PgValue::Bool(buffer.get_bool(slot)?),
        LogicalType::Int8 => PgValue::I16(buffer.get_i8(slot)? as i16),
        LogicalType::UInt8 => PgValue::I16(buffer.get_u8(slot)? as i16),
        LogicalType::Int16 => PgValue::I16(buffer.get_i16(slot)?),
        LogicalType::UInt16 => PgValue::I32(buffer.get_u16(slot)? as i32),
        LogicalType::Int32 => PgValue::I32(buffer.get_i32(slot)?),
        LogicalType::UInt32 => PgValue::I64(buffer.get_u32(slot)? as i64),
        LogicalType::Int64 => PgValue::I64(buffer.get_i64(slot)?),
        LogicalType::UInt64 => {
            let v = buffer.get_u64(slot)?;
            match i64::try_from(v) {
                Ok(n) => PgValue::I64(n),
                Err(_) => PgValue::Decimal(Decimal::from(v)),
            }
        }
        LogicalType::Float32 => PgValue::F32(buffer.get_f32(slot)?),
        LogicalType::Float64 => PgValue::F64(buffer.get_f64(slot)?),
        LogicalType::Numeric | LogicalType::Currency => {
            PgValue::Decimal(buffer.get_decimal(slot)?)
        }
        LogicalType::AnsiText | LogicalType::WideText => PgValue::Text(buffer.get_str(slot)?),
        LogicalType::LargeAnsiText | LogicalType::LargeWideText => {
            let bytes = buffer.get_blob(slot)?;
            let text = String::from_utf8(bytes).map_err(|_| {
                LoadError::Source(format!("slot {}: large text cell is not valid UTF-8", slot))
            })?;
            PgValue::Text(text)
        }
        LogicalType::Bytes => PgValue::Bytes(buffer.get_bytes(slot)?),
        LogicalType::LargeBytes => PgValue::Bytes(buffer.get_blob(slot)?),
        LogicalType::Date => PgValue::Date(buffer.get_date(slot)?),
        LogicalType::Time => PgValue::Time(buffer.get_time(slot)?),
        LogicalType::TimeTz => {
            let (time, offset) = buffer.get_time_tz(slot)?;
            PgValue::TimeTz(time, offset)
        }
        LogicalType::Timestamp => PgValue::Timestamp(buffer.get_timestamp(slot)?),
        LogicalType::TimestampTz => PgValue::TimestampTz(buffer.get_timestamp_tz(slot)?),
        LogicalType::Uuid => PgValue::Uuid(buffer.get_uuid(slot)?),
    };

    Ok(value)
}

/// Coerce an extracted value into the destination column's representation.
///
/// NULLs pass through retagged with the descriptor's type hint, never a
/// sentinel. Integer narrowing is checked; text/binary length limits come
/// from the descriptor when it is not a large-object column; explicit
/// NUMERIC(p,s) modifiers govern the encoded precision and scale.
pub fn encode(value: PgValue, desc: &ColumnDescriptor) -> Result<PgValue> {
    if value.is_null() {
        return Ok(PgValue::Null(null_hint(desc.logical_type)));
    }

    match desc.logical_type {
        LogicalType::Bool => match value {
            PgValue::Bool(_) => Ok(value),
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::Int8 | LogicalType::UInt8 | LogicalType::Int16 => {
            let n = integer_of(desc, &value)?;
            i16::try_from(n)
                .map(PgValue::I16)
                .map_err(|_| overflow(desc, n, "smallint"))
        }
        LogicalType::UInt16 | LogicalType::Int32 => {
            let n = integer_of(desc, &value)?;
            i32::try_from(n)
                .map(PgValue::I32)
                .map_err(|_| overflow(desc, n, "integer"))
        }
        LogicalType::UInt32 | LogicalType::Int64 | LogicalType::UInt64 => {
            let n = integer_of(desc, &value)?;
            Ok(PgValue::I64(n))
        }
        LogicalType::Float32 => match value {
            PgValue::F32(_) => Ok(value),
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::Float64 => match value {
            PgValue::F64(_) => Ok(value),
            PgValue::F32(f) => Ok(PgValue::F64(f as f64)),
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::Numeric => {
            let d = decimal_of(desc, value)?;
            encode_decimal(d, desc)
        }
        LogicalType::Currency => {
            let d = decimal_of(desc, value)?;
            encode_money(d, desc)
        }
        LogicalType::AnsiText | LogicalType::WideText => match value {
            PgValue::Text(s) => {
                let chars = s.chars().count() as i32;
                if desc.length > 0 && chars > desc.length {
                    return Err(LoadError::conversion(
                        &desc.name,
                        format!(
                            "value of {} characters exceeds column length {}",
                            chars, desc.length
                        ),
                    ));
                }
                Ok(PgValue::Text(s))
            }
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::LargeAnsiText | LogicalType::LargeWideText => match value {
            PgValue::Text(_) => Ok(value),
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::Bytes => match value {
            PgValue::Bytes(b) => {
                if desc.length > 0 && b.len() as i32 > desc.length {
                    return Err(LoadError::conversion(
                        &desc.name,
                        format!(
                            "value of {} bytes exceeds column length {}",
                            b.len(),
                            desc.length
                        ),
                    ));
                }
                Ok(PgValue::Bytes(b))
            }
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::LargeBytes => match value {
            PgValue::Bytes(_) => Ok(value),
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::Uuid => match value {
            PgValue::Uuid(_) => Ok(value),
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::Date => match value {
            PgValue::Date(_) => Ok(value),
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::Time => match value {
            PgValue::Time(_) => Ok(value),
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::TimeTz => match value {
            PgValue::TimeTz(_, _) => Ok(value),
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::Timestamp => match value {
            PgValue::Timestamp(_) => Ok(value),
            // The destination type carries no offset: normalization is
            // demanded, the instant is preserved.
            PgValue::TimestampTz(dt) => Ok(PgValue::Timestamp(dt.naive_utc())),
            other => Err(type_mismatch(desc, &other)),
        },
        LogicalType::TimestampTz => match value {
            PgValue::TimestampTz(_) => Ok(value),
            PgValue::Timestamp(dt) => Ok(PgValue::TimestampTz(
                dt.and_utc().fixed_offset(),
            )),
            other => Err(type_mismatch(desc, &other)),
        },
    }
}

/// Extract and encode every bound cell of the current row, in binding order.
pub fn extract_row(buffer: &dyn RowBuffer, bindings: &[ColumnBinding]) -> Result<Vec<PgValue>> {
    let mut row = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let value = extract(buffer, binding.slot, binding.source_type).map_err(|e| match e {
            LoadError::Source(msg) => LoadError::conversion(&binding.descriptor.name, msg),
            other => other,
        })?;
        row.push(encode(value, &binding.descriptor)?);
    }
    Ok(row)
}

/// Widen an exact value to a decimal for numeric/money destinations.
fn decimal_of(desc: &ColumnDescriptor, value: PgValue) -> Result<Decimal> {
    match value {
        PgValue::Decimal(d) => Ok(d),
        PgValue::I16(n) => Ok(Decimal::from(n)),
        PgValue::I32(n) => Ok(Decimal::from(n)),
        PgValue::I64(n) => Ok(Decimal::from(n)),
        other => Err(type_mismatch(desc, &other)),
    }
}

/// Widen any integer value to i64 for checked narrowing.
fn integer_of(desc: &ColumnDescriptor, value: &PgValue) -> Result<i64> {
    match value {
        PgValue::I16(n) => Ok(*n as i64),
        PgValue::I32(n) => Ok(*n as i64),
        PgValue::I64(n) => Ok(*n),
        PgValue::Decimal(d) => Err(LoadError::conversion(
            &desc.name,
            format!("value {} does not fit a 64-bit destination integer", d),
        )),
        other => Err(type_mismatch(desc, other)),
    }
}

/// Apply the descriptor's precision/scale to an exact-numeric value.
///
/// Only an explicit NUMERIC(p,s) modifier constrains the value; the default
/// precision 29 / scale 0 of an unconstrained column is metadata, not an
/// encoding rule.
fn encode_decimal(d: Decimal, desc: &ColumnDescriptor) -> Result<PgValue> {
    let Some((precision, scale)) = numeric_constraint(desc) else {
        return Ok(PgValue::Decimal(d));
    };

    let mut scaled = round_half_away(d, scale);
    scaled.rescale(scale);

    if integral_digits(&scaled) > precision.saturating_sub(scale) {
        return Err(LoadError::conversion(
            &desc.name,
            format!(
                "value {} does not fit numeric({},{})",
                d, precision, scale
            ),
        ));
    }

    Ok(PgValue::Decimal(scaled))
}

/// Encode a currency value as hundredths in a 64-bit integer, the money
/// wire representation.
fn encode_money(d: Decimal, desc: &ColumnDescriptor) -> Result<PgValue> {
    let mut scaled = round_half_away(d, 2);
    scaled.rescale(2);

    let cents = i64::try_from(scaled.mantissa()).map_err(|_| {
        LoadError::conversion(&desc.name, format!("value {} does not fit a money column", d))
    })?;

    Ok(PgValue::Money(cents))
}

/// Round to `scale` decimal places the way the destination does: ties go
/// away from zero, not to even.
fn round_half_away(d: Decimal, scale: u32) -> Decimal {
    d.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// The explicit (precision, scale) constraint of a numeric column, if any.
fn numeric_constraint(desc: &ColumnDescriptor) -> Option<(u32, u32)> {
    if desc.logical_type.is_exact_numeric() && desc.typmod >= 4 {
        Some((desc.precision as u32, desc.scale as u32))
    } else {
        None
    }
}

/// Count digits before the decimal point.
fn integral_digits(d: &Decimal) -> u32 {
    let t = d.abs().trunc();
    if t.is_zero() {
        0
    } else {
        t.to_string().len() as u32
    }
}

fn overflow(desc: &ColumnDescriptor, n: i64, ty: &str) -> LoadError {
    LoadError::conversion(
        &desc.name,
        format!("value {} overflows destination type {}", n, ty),
    )
}

fn type_mismatch(desc: &ColumnDescriptor, value: &PgValue) -> LoadError {
    LoadError::conversion(
        &desc.name,
        format!(
            "cannot encode {:?} as destination type {}",
            value,
            desc.pg_type.name()
        ),
    )
}
