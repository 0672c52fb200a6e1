//! Destination schema introspection.
//!
//! Discovers the shape of the destination table once, at metadata
//! (re)generation time, and reproduces it as typed column descriptors. The
//! introspection is read-only: a zero-row schema-only statement provides the
//! ordered column set and native types, and `pg_catalog.pg_attribute`
//! provides the per-column size modifiers.

use std::collections::HashMap;

use tokio_postgres::types::Type;
use tokio_postgres::Client;

use crate::error::{LoadError, Result};

/// Default numeric precision when the destination reports none.
const DEFAULT_NUMERIC_PRECISION: i32 = 29;

/// Scale sentinel meaning "not set" in source-database convention.
const SCALE_UNSET_SENTINEL: i32 = 255;

/// Size of the varlena header subtracted from text/binary type modifiers.
const VARHDRSZ: i32 = 4;

/// Abstract data-type tag, independent of the driver's native enumeration.
///
/// Covers every logical type the row source can produce. The `Large*`
/// variants are the unbounded (streamed) promotions of their bounded
/// counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Numeric,
    Currency,
    AnsiText,
    WideText,
    LargeAnsiText,
    LargeWideText,
    Bytes,
    LargeBytes,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Uuid,
}

impl LogicalType {
    /// Whether this type carries a length limit (text/binary kinds).
    pub fn is_variable_length(&self) -> bool {
        matches!(
            self,
            LogicalType::AnsiText
                | LogicalType::WideText
                | LogicalType::LargeAnsiText
                | LogicalType::LargeWideText
                | LogicalType::Bytes
                | LogicalType::LargeBytes
        )
    }

    /// Whether this is an exact-numeric type governed by precision/scale.
    pub fn is_exact_numeric(&self) -> bool {
        matches!(self, LogicalType::Numeric | LogicalType::Currency)
    }

    /// Whether this is an unbounded large-object variant.
    pub fn is_large_object(&self) -> bool {
        matches!(
            self,
            LogicalType::LargeAnsiText | LogicalType::LargeWideText | LogicalType::LargeBytes
        )
    }

    /// The large-object promotion of this type, if one exists.
    pub fn large_variant(&self) -> Option<LogicalType> {
        match self {
            LogicalType::AnsiText => Some(LogicalType::LargeAnsiText),
            LogicalType::WideText => Some(LogicalType::LargeWideText),
            LogicalType::Bytes => Some(LogicalType::LargeBytes),
            _ => None,
        }
    }
}

/// Design-time descriptor for one destination column.
///
/// Created when destination metadata is (re)generated and immutable
/// thereafter. `pg_type` is the driver's native type tag, stored opaquely so
/// the load strategies can hand it straight back to the driver; `typmod` is
/// the raw size modifier the length/precision/scale were derived from.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    /// Column name, unique within the table.
    pub name: String,

    /// Logical type tag.
    pub logical_type: LogicalType,

    /// Length limit; meaningful only for variable-length text/binary types.
    pub length: i32,

    /// Numeric precision; meaningful only for exact-numeric types.
    pub precision: i32,

    /// Numeric scale; meaningful only for exact-numeric types.
    pub scale: i32,

    /// Whether the type was promoted to its unbounded "long" variant.
    pub is_large_object: bool,

    /// Native destination type tag.
    pub pg_type: Type,

    /// Raw native type modifier (-1 when none).
    pub typmod: i32,
}

/// Map a native destination type to its logical tag.
///
/// The fixed native-to-logical table. Unknown types fall back to unbounded
/// wide text, which streams safely in both load modes.
pub fn logical_type_of(ty: &Type) -> LogicalType {
    match ty.name() {
        "bool" => LogicalType::Bool,
        "int2" => LogicalType::Int16,
        "int4" => LogicalType::Int32,
        "int8" => LogicalType::Int64,
        "float4" => LogicalType::Float32,
        "float8" => LogicalType::Float64,
        "numeric" => LogicalType::Numeric,
        "money" => LogicalType::Currency,
        "char" => LogicalType::AnsiText,
        "bpchar" | "varchar" | "name" => LogicalType::WideText,
        "text" => LogicalType::LargeWideText,
        "bytea" => LogicalType::LargeBytes,
        "uuid" => LogicalType::Uuid,
        "date" => LogicalType::Date,
        "time" => LogicalType::Time,
        "timetz" => LogicalType::TimeTz,
        "timestamp" => LogicalType::Timestamp,
        "timestamptz" => LogicalType::TimestampTz,
        _ => LogicalType::LargeWideText,
    }
}

/// Whether the loader knows the type's binary receive format.
///
/// Types outside the mapping table descriptor-ize as unbounded wide text
/// and load only through the INSERT strategy's server-side text cast.
pub fn has_native_binary_format(ty: &Type) -> bool {
    matches!(
        ty.name(),
        "bool"
            | "int2"
            | "int4"
            | "int8"
            | "float4"
            | "float8"
            | "numeric"
            | "money"
            | "char"
            | "bpchar"
            | "varchar"
            | "name"
            | "text"
            | "bytea"
            | "uuid"
            | "date"
            | "time"
            | "timetz"
            | "timestamp"
            | "timestamptz"
    )
}

/// Normalize a reported numeric scale, mapping the unset sentinel to zero.
fn normalize_scale(scale: i32) -> i32 {
    if scale == SCALE_UNSET_SENTINEL {
        0
    } else {
        scale
    }
}

/// Decode precision and scale from a numeric type modifier.
///
/// An absent modifier yields the default precision (29) and scale 0,
/// mirroring the source-database convention.
fn decode_numeric_typmod(typmod: i32) -> (i32, i32) {
    if typmod < VARHDRSZ {
        return (DEFAULT_NUMERIC_PRECISION, 0);
    }
    let packed = typmod - VARHDRSZ;
    let precision = (packed >> 16) & 0xffff;
    let scale = packed & 0xffff;
    (precision, normalize_scale(scale))
}

/// Decode a character/binary length from a type modifier, 0 when absent.
fn decode_length_typmod(typmod: i32) -> i32 {
    if typmod < VARHDRSZ {
        0
    } else {
        typmod - VARHDRSZ
    }
}

/// Derive a full descriptor from one column's native metadata.
pub fn descriptor_from_column(name: &str, ty: &Type, typmod: i32) -> ColumnDescriptor {
    let mut logical = logical_type_of(ty);

    // A bounded text/binary kind with no length modifier exceeds normal
    // in-row storage: promote to the large-object variant.
    if typmod < VARHDRSZ {
        if let Some(large) = logical.large_variant() {
            logical = large;
        }
    }

    let length = if logical.is_variable_length() {
        decode_length_typmod(typmod)
    } else {
        0
    };

    let (precision, scale) = if logical.is_exact_numeric() {
        decode_numeric_typmod(typmod)
    } else {
        (0, 0)
    };

    ColumnDescriptor {
        name: name.to_string(),
        logical_type: logical,
        length,
        precision,
        scale,
        is_large_object: logical.is_large_object(),
        pg_type: ty.clone(),
        typmod,
    }
}

/// Query returning each live column's raw type modifier, in column order.
const TYPMOD_SQL: &str = "SELECT a.attname, a.atttypmod \
     FROM pg_catalog.pg_attribute a \
     WHERE a.attrelid = to_regclass($1) \
       AND a.attnum > 0 AND NOT a.attisdropped \
     ORDER BY a.attnum";

/// Describe the destination table as an ordered set of column descriptors.
///
/// Issues a zero-row schema-only statement for the ordered column set and
/// native types, then reads size modifiers from the catalog. Fails whole on
/// any error; never returns a partial descriptor set and never mutates
/// destination state.
pub async fn describe(client: &Client, table_name: &str) -> Result<Vec<ColumnDescriptor>> {
    if table_name.trim().is_empty() {
        return Err(LoadError::Config(
            "table name needs to be provided".to_string(),
        ));
    }

    let stmt = client
        .prepare(&format!("SELECT * FROM {} LIMIT 0", table_name))
        .await
        .map_err(|e| LoadError::schema(table_name, format!("schema-only query failed: {}", e)))?;

    let rows = client
        .query(TYPMOD_SQL, &[&table_name])
        .await
        .map_err(|e| LoadError::schema(table_name, format!("catalog lookup failed: {}", e)))?;

    let typmods: HashMap<String, i32> = rows
        .iter()
        .map(|row| (row.get::<_, String>(0), row.get::<_, i32>(1)))
        .collect();

    let descriptors = stmt
        .columns()
        .iter()
        .map(|col| {
            let typmod = typmods.get(col.name()).copied().unwrap_or(-1);
            descriptor_from_column(col.name(), col.type_(), typmod)
        })
        .collect();

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack precision/scale the way pg_attribute stores numeric typmods.
    fn numeric_typmod(precision: i32, scale: i32) -> i32 {
        ((precision << 16) | (scale & 0xffff)) + VARHDRSZ
    }

    #[test]
    fn test_logical_type_table() {
        assert_eq!(logical_type_of(&Type::BOOL), LogicalType::Bool);
        assert_eq!(logical_type_of(&Type::INT2), LogicalType::Int16);
        assert_eq!(logical_type_of(&Type::INT4), LogicalType::Int32);
        assert_eq!(logical_type_of(&Type::INT8), LogicalType::Int64);
        assert_eq!(logical_type_of(&Type::FLOAT4), LogicalType::Float32);
        assert_eq!(logical_type_of(&Type::FLOAT8), LogicalType::Float64);
        assert_eq!(logical_type_of(&Type::NUMERIC), LogicalType::Numeric);
        assert_eq!(logical_type_of(&Type::MONEY), LogicalType::Currency);
        assert_eq!(logical_type_of(&Type::VARCHAR), LogicalType::WideText);
        assert_eq!(logical_type_of(&Type::TEXT), LogicalType::LargeWideText);
        assert_eq!(logical_type_of(&Type::BYTEA), LogicalType::LargeBytes);
        assert_eq!(logical_type_of(&Type::UUID), LogicalType::Uuid);
        assert_eq!(logical_type_of(&Type::DATE), LogicalType::Date);
        assert_eq!(logical_type_of(&Type::TIME), LogicalType::Time);
        assert_eq!(logical_type_of(&Type::TIMETZ), LogicalType::TimeTz);
        assert_eq!(logical_type_of(&Type::TIMESTAMP), LogicalType::Timestamp);
        assert_eq!(
            logical_type_of(&Type::TIMESTAMPTZ),
            LogicalType::TimestampTz
        );
    }

    #[test]
    fn test_unknown_type_falls_back_to_large_text() {
        assert_eq!(logical_type_of(&Type::JSONB), LogicalType::LargeWideText);
        // The fallback carries no binary receive format.
        assert!(!has_native_binary_format(&Type::JSONB));
        assert!(has_native_binary_format(&Type::TEXT));
        assert!(has_native_binary_format(&Type::MONEY));
    }

    #[test]
    fn test_varchar_length_from_typmod() {
        let desc = descriptor_from_column("title", &Type::VARCHAR, 50 + VARHDRSZ);
        assert_eq!(desc.logical_type, LogicalType::WideText);
        assert_eq!(desc.length, 50);
        assert!(!desc.is_large_object);
        assert_eq!(desc.precision, 0);
        assert_eq!(desc.scale, 0);
    }

    #[test]
    fn test_unbounded_varchar_promotes_to_large() {
        let desc = descriptor_from_column("body", &Type::VARCHAR, -1);
        assert_eq!(desc.logical_type, LogicalType::LargeWideText);
        assert!(desc.is_large_object);
        assert_eq!(desc.length, 0);
    }

    #[test]
    fn test_text_and_bytea_are_large_objects() {
        let text = descriptor_from_column("notes", &Type::TEXT, -1);
        assert_eq!(text.logical_type, LogicalType::LargeWideText);
        assert!(text.is_large_object);

        let blob = descriptor_from_column("payload", &Type::BYTEA, -1);
        assert_eq!(blob.logical_type, LogicalType::LargeBytes);
        assert!(blob.is_large_object);
    }

    #[test]
    fn test_numeric_precision_scale_from_typmod() {
        let desc = descriptor_from_column("amount", &Type::NUMERIC, numeric_typmod(18, 4));
        assert_eq!(desc.precision, 18);
        assert_eq!(desc.scale, 4);
    }

    #[test]
    fn test_numeric_defaults_when_unconstrained() {
        let desc = descriptor_from_column("amount", &Type::NUMERIC, -1);
        assert_eq!(desc.precision, DEFAULT_NUMERIC_PRECISION);
        assert_eq!(desc.scale, 0);
    }

    #[test]
    fn test_scale_sentinel_normalizes_to_zero() {
        assert_eq!(normalize_scale(255), 0);
        assert_eq!(normalize_scale(4), 4);
        let desc = descriptor_from_column("amount", &Type::NUMERIC, numeric_typmod(20, 255));
        assert_eq!(desc.precision, 20);
        assert_eq!(desc.scale, 0);
    }

    #[test]
    fn test_length_unset_for_fixed_width_types() {
        let desc = descriptor_from_column("id", &Type::INT8, -1);
        assert_eq!(desc.length, 0);
        assert_eq!(desc.precision, 0);
        assert_eq!(desc.scale, 0);
        assert!(!desc.is_large_object);
    }
}
