//! Load strategies for the destination table.
//!
//! Both strategies consume encoded rows through the [`RowSink`] trait and
//! share the batch iteration in [`pump`], so row handling cannot diverge
//! between them. [`InsertSink`] executes one prepared statement per row;
//! [`CopySink`] streams the binary COPY protocol.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::Timelike;
use futures::SinkExt;
use rust_decimal::Decimal;
use tokio_postgres::{Client, CopyInSink, Statement};
use tracing::debug;

use crate::bind::ColumnBinding;
use crate::codec::extract_row;
use crate::error::{LoadError, Result};
use crate::schema::has_native_binary_format;
use crate::source::RowBuffer;
use crate::value::PgValue;

/// Flush the COPY buffer to the socket once it grows past this.
const COPY_FLUSH_BYTES: usize = 1024 * 1024;

/// Destination endpoint for encoded rows.
///
/// A sink receives rows in binding order and reports the delivered row count
/// from [`RowSink::finish`]. A sink that has returned an error must not be
/// written to again.
#[async_trait]
pub trait RowSink {
    async fn write_row(&mut self, row: &[PgValue]) -> Result<()>;

    /// Complete the load and return the number of rows delivered.
    async fn finish(&mut self) -> Result<u64>;
}

/// Drive one batch from the row source into a sink.
///
/// Advances the buffer row by row, extracts and encodes the bound cells, and
/// hands each encoded row to the sink. The first failure abandons the batch;
/// the sink is only finished after every row went through.
pub async fn pump(
    buffer: &mut dyn RowBuffer,
    bindings: &[ColumnBinding],
    sink: &mut dyn RowSink,
) -> Result<u64> {
    while buffer.next_row()? {
        let row = extract_row(buffer, bindings)?;
        sink.write_row(&row).await?;
    }
    sink.finish().await
}

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Build the per-row INSERT statement for a binding list.
///
/// Parameters are sent as text and cast to the column's native type inside
/// the statement, so one statement shape covers every destination type.
pub fn build_insert_sql(table: &str, bindings: &[ColumnBinding]) -> String {
    let cols: Vec<String> = bindings
        .iter()
        .map(|b| quote_ident(&b.descriptor.name))
        .collect();
    let placeholders: Vec<String> = bindings
        .iter()
        .enumerate()
        .map(|(i, b)| format!("${}::text::{}", i + 1, b.descriptor.pg_type.name()))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        cols.join(", "),
        placeholders.join(", ")
    )
}

/// Build the COPY statement for a binding list.
///
/// Column order matches [`build_insert_sql`] exactly: both come from the
/// same binding slice.
pub fn build_copy_sql(table: &str, bindings: &[ColumnBinding]) -> String {
    let cols: Vec<String> = bindings
        .iter()
        .map(|b| quote_ident(&b.descriptor.name))
        .collect();

    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT BINARY)",
        quote_ident(table),
        cols.join(", ")
    )
}

/// Reject bindings the binary COPY path cannot serve.
///
/// COPY delivers every value in the column's binary receive format. A type
/// outside the fixed mapping table only loads through its text form, which
/// the INSERT strategy provides.
pub fn ensure_binary_support(table: &str, bindings: &[ColumnBinding]) -> Result<()> {
    for binding in bindings {
        let ty = &binding.descriptor.pg_type;
        if !has_native_binary_format(ty) {
            return Err(LoadError::load(
                table,
                format!(
                    "column {} has type {} with no binary COPY representation; \
                     use the insert strategy",
                    binding.descriptor.name,
                    ty.name()
                ),
            ));
        }
    }
    Ok(())
}

/// Render a value as the text form of a statement parameter.
///
/// NULL stays NULL; everything else becomes the literal PostgreSQL parses
/// for the column's type on the server side.
fn text_param(value: &PgValue) -> Option<String> {
    match value {
        PgValue::Null(_) => None,
        PgValue::Bool(b) => Some(if *b { "t" } else { "f" }.to_string()),
        PgValue::I16(i) => Some(i.to_string()),
        PgValue::I32(i) => Some(i.to_string()),
        PgValue::I64(i) => Some(i.to_string()),
        PgValue::F32(f) => Some(f.to_string()),
        PgValue::F64(f) => Some(f.to_string()),
        PgValue::Text(s) => Some(s.clone()),
        PgValue::Bytes(b) => Some(format!("\\x{}", hex::encode(b))),
        PgValue::Uuid(u) => Some(u.to_string()),
        PgValue::Decimal(d) => Some(d.to_string()),
        PgValue::Money(c) => Some(Decimal::new(*c, 2).to_string()),
        PgValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        PgValue::Time(t) => Some(t.format("%H:%M:%S%.f").to_string()),
        PgValue::TimeTz(t, off) => Some(format!("{}{}", t.format("%H:%M:%S%.f"), off)),
        PgValue::Timestamp(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        PgValue::TimestampTz(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string()),
    }
}

/// Row-at-a-time loader over a prepared INSERT.
pub struct InsertSink<'a> {
    client: &'a Client,
    statement: Statement,
    table: String,
    rows: u64,
}

impl<'a> InsertSink<'a> {
    pub fn new(client: &'a Client, statement: Statement, table: &str) -> Self {
        Self {
            client,
            statement,
            table: table.to_string(),
            rows: 0,
        }
    }
}

#[async_trait]
impl RowSink for InsertSink<'_> {
    async fn write_row(&mut self, row: &[PgValue]) -> Result<()> {
        let owned: Vec<Option<String>> = row.iter().map(text_param).collect();
        let params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = owned
            .iter()
            .map(|p| p as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();

        self.client
            .execute(&self.statement, &params)
            .await
            .map_err(|e| LoadError::load(&self.table, format!("INSERT failed: {}", e)))?;

        self.rows += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64> {
        debug!(table = %self.table, rows = self.rows, "insert batch complete");
        Ok(self.rows)
    }
}

/// Streaming loader over the binary COPY protocol.
///
/// The sink owns one COPY operation; dropping it without
/// [`RowSink::finish`] aborts the stream server-side.
pub struct CopySink {
    sink: Pin<Box<CopyInSink<Bytes>>>,
    buf: BytesMut,
    table: String,
    rows: u64,
}

impl CopySink {
    /// Open a COPY stream on the client and write the stream header.
    pub async fn open(client: &Client, table: &str, copy_sql: &str) -> Result<Self> {
        let sink = client
            .copy_in(copy_sql)
            .await
            .map_err(|e| LoadError::load(table, format!("COPY init: {}", e)))?;

        let mut buf = BytesMut::with_capacity(COPY_FLUSH_BYTES);
        put_copy_header(&mut buf);

        Ok(Self {
            sink: Box::pin(sink),
            buf,
            table: table.to_string(),
            rows: 0,
        })
    }

    async fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let data = self.buf.split().freeze();
        self.sink
            .send(data)
            .await
            .map_err(|e| LoadError::load(&self.table, format!("COPY send: {}", e)))
    }
}

#[async_trait]
impl RowSink for CopySink {
    async fn write_row(&mut self, row: &[PgValue]) -> Result<()> {
        put_copy_row(&mut self.buf, row);
        self.rows += 1;

        if self.buf.len() >= COPY_FLUSH_BYTES {
            self.flush().await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64> {
        self.buf.put_i16(-1); // stream trailer
        self.flush().await?;

        let copied = self
            .sink
            .as_mut()
            .finish()
            .await
            .map_err(|e| LoadError::load(&self.table, format!("COPY finish: {}", e)))?;

        debug!(table = %self.table, rows = copied, "copy batch complete");
        Ok(copied)
    }
}

/// PGCOPY signature, flags, and extension area length.
fn put_copy_header(buf: &mut BytesMut) {
    buf.put_slice(b"PGCOPY\n\xff\r\n\0");
    buf.put_i32(0); // flags
    buf.put_i32(0); // extension area length
}

/// One COPY tuple: field count, then each field length-prefixed.
fn put_copy_row(buf: &mut BytesMut, row: &[PgValue]) {
    buf.put_i16(row.len() as i16);
    for value in row {
        write_binary_value(buf, value);
    }
}

/// Write one value in PostgreSQL binary format, length prefix included.
fn write_binary_value(buf: &mut BytesMut, value: &PgValue) {
    match value {
        PgValue::Null(_) => {
            buf.put_i32(-1);
        }
        PgValue::Bool(b) => {
            buf.put_i32(1);
            buf.put_u8(u8::from(*b));
        }
        PgValue::I16(i) => {
            buf.put_i32(2);
            buf.put_i16(*i);
        }
        PgValue::I32(i) => {
            buf.put_i32(4);
            buf.put_i32(*i);
        }
        PgValue::I64(i) => {
            buf.put_i32(8);
            buf.put_i64(*i);
        }
        PgValue::F32(f) => {
            buf.put_i32(4);
            buf.put_f32(*f);
        }
        PgValue::F64(f) => {
            buf.put_i32(8);
            buf.put_f64(*f);
        }
        PgValue::Text(s) => {
            let bytes = s.as_bytes();
            buf.put_i32(bytes.len() as i32);
            buf.put_slice(bytes);
        }
        PgValue::Bytes(b) => {
            buf.put_i32(b.len() as i32);
            buf.put_slice(b);
        }
        PgValue::Uuid(u) => {
            buf.put_i32(16);
            buf.put_slice(u.as_bytes());
        }
        PgValue::Decimal(d) => {
            encode_decimal_binary(buf, d);
        }
        PgValue::Money(c) => {
            // money is a fixed 8-byte integer of hundredths on the wire.
            buf.put_i32(8);
            buf.put_i64(*c);
        }
        PgValue::Date(d) => {
            // Days since 2000-01-01.
            let epoch = pg_epoch_date();
            let days = (*d - epoch).num_days() as i32;
            buf.put_i32(4);
            buf.put_i32(days);
        }
        PgValue::Time(t) => {
            buf.put_i32(8);
            buf.put_i64(micros_from_midnight(t));
        }
        PgValue::TimeTz(t, off) => {
            // timetz: microseconds since midnight plus the zone offset in
            // seconds west of UTC.
            buf.put_i32(12);
            buf.put_i64(micros_from_midnight(t));
            buf.put_i32(-off.local_minus_utc());
        }
        PgValue::Timestamp(dt) => {
            // Microseconds since 2000-01-01.
            let epoch = pg_epoch_date().and_hms_opt(0, 0, 0).unwrap_or_default();
            let micros = (*dt - epoch).num_microseconds().unwrap_or(0);
            buf.put_i32(8);
            buf.put_i64(micros);
        }
        PgValue::TimestampTz(dt) => {
            let epoch = pg_epoch_date().and_hms_opt(0, 0, 0).unwrap_or_default();
            let micros = (dt.naive_utc() - epoch).num_microseconds().unwrap_or(0);
            buf.put_i32(8);
            buf.put_i64(micros);
        }
    }
}

fn pg_epoch_date() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

fn micros_from_midnight(t: &chrono::NaiveTime) -> i64 {
    t.num_seconds_from_midnight() as i64 * 1_000_000 + (t.nanosecond() / 1000) as i64
}

/// Encode a decimal into PostgreSQL binary NUMERIC format.
///
/// The wire layout is ndigits (i16), weight (i16), sign (i16), dscale (i16),
/// then the base-10000 digit array. Weight is the position of the first digit
/// group relative to the decimal point.
fn encode_decimal_binary(buf: &mut BytesMut, d: &Decimal) {
    const NUMERIC_POS: i16 = 0x0000;
    const NUMERIC_NEG: i16 = 0x4000;

    if d.is_zero() {
        buf.put_i32(8);
        buf.put_i16(0); // ndigits
        buf.put_i16(0); // weight
        buf.put_i16(NUMERIC_POS);
        buf.put_i16(d.scale() as i16);
        return;
    }

    let sign = if d.is_sign_negative() {
        NUMERIC_NEG
    } else {
        NUMERIC_POS
    };
    let dscale = d.scale() as i16;

    // Group digits around the decimal point from the string form; the raw
    // mantissa loses the position of leading fractional zeros.
    let abs_str = d.abs().to_string();
    let (int_part, frac_part) = match abs_str.find('.') {
        Some(dot) => (&abs_str[..dot], &abs_str[dot + 1..]),
        None => (abs_str.as_str(), ""),
    };

    // Integer part: pad on the left to a multiple of 4.
    let mut digits: Vec<i16> = Vec::new();
    let int_trimmed = int_part.trim_start_matches('0');
    if !int_trimmed.is_empty() {
        let width = int_trimmed.len().div_ceil(4) * 4;
        let padded = format!("{:0>width$}", int_trimmed, width = width);
        for chunk in padded.as_bytes().chunks(4) {
            digits.push(chunk.iter().fold(0i16, |acc, b| acc * 10 + (b - b'0') as i16));
        }
    }
    let int_groups = digits.len() as i16;

    // Fractional part: pad on the right to a multiple of 4.
    if !frac_part.is_empty() {
        let mut padded = frac_part.to_string();
        while padded.len() % 4 != 0 {
            padded.push('0');
        }
        for chunk in padded.as_bytes().chunks(4) {
            digits.push(chunk.iter().fold(0i16, |acc, b| acc * 10 + (b - b'0') as i16));
        }
    }

    let weight = if int_groups > 0 {
        int_groups - 1
    } else {
        // All fractional: count leading zero groups below the point.
        let leading_zero_groups = digits.iter().take_while(|&&g| g == 0).count() as i16;
        -(leading_zero_groups + 1)
    };

    // PostgreSQL stores neither trailing nor leading zero groups. Weight
    // already points at the first non-zero group.
    while digits.len() > 1 && digits.last() == Some(&0) {
        digits.pop();
    }
    while digits.len() > 1 && digits[0] == 0 {
        digits.remove(0);
    }

    let ndigits = digits.len() as i16;
    buf.put_i32(8 + i32::from(ndigits) * 2);
    buf.put_i16(ndigits);
    buf.put_i16(weight);
    buf.put_i16(sign);
    buf.put_i16(dscale);
    for digit in digits {
        buf.put_i16(digit);
    }
}
