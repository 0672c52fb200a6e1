//! End-to-end pipeline tests over the public API, without a live server.
//!
//! A recording sink stands in for the destination so the full
//! layout -> bind -> extract -> encode -> sink path is exercised exactly as
//! a session drives it.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio_postgres::types::Type;
use uuid::Uuid;

use pg_destination::bind::bind;
use pg_destination::schema::descriptor_from_column;
use pg_destination::source::memory::{Cell, MemoryRows};
use pg_destination::source::{ColumnLayout, InputColumn};
use pg_destination::writer::pump;
use pg_destination::{LoadError, LogicalType, PgNullType, PgValue, Result, RowSink};

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

struct RecordingSink {
    rows: Vec<Vec<PgValue>>,
    finished: bool,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            finished: false,
        }
    }
}

#[async_trait]
impl RowSink for RecordingSink {
    async fn write_row(&mut self, row: &[PgValue]) -> Result<()> {
        self.rows.push(row.to_vec());
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64> {
        self.finished = true;
        Ok(self.rows.len() as u64)
    }
}

fn numeric_typmod(precision: i32, scale: i32) -> i32 {
    ((precision << 16) | (scale & 0xffff)) + 4
}

#[tokio::test]
async fn mixed_type_batch_reaches_sink_encoded() {
    init_tracing();
    let descriptors = vec![
        descriptor_from_column("id", &Type::INT8, -1),
        descriptor_from_column("label", &Type::VARCHAR, 16 + 4),
        descriptor_from_column("amount", &Type::NUMERIC, numeric_typmod(12, 2)),
        descriptor_from_column("tag", &Type::UUID, -1),
        descriptor_from_column("created", &Type::DATE, -1),
    ];

    // Layout in a different order than the table; binding follows layout.
    let layout = ColumnLayout::new(vec![
        InputColumn::simple("created", 4, LogicalType::Date),
        InputColumn::simple("id", 0, LogicalType::UInt32),
        InputColumn::simple("label", 1, LogicalType::WideText),
        InputColumn::simple("amount", 2, LogicalType::Numeric),
        InputColumn::simple("tag", 3, LogicalType::Uuid),
    ]);
    let bindings = bind(&layout, &descriptors).unwrap();

    let tag = Uuid::new_v4();
    let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
    let mut rows = MemoryRows::new(vec![
        vec![
            Cell::U32(3_000_000_000),
            Cell::Str("widget".into()),
            Cell::Decimal(Decimal::new(995, 1)), // 99.5
            Cell::Uuid(tag),
            Cell::Date(date),
        ],
        vec![
            Cell::U32(7),
            Cell::Null,
            Cell::Decimal(Decimal::ZERO),
            Cell::Null,
            Cell::Null,
        ],
    ]);

    let mut sink = RecordingSink::new();
    let n = pump(&mut rows, &bindings, &mut sink).await.unwrap();
    assert_eq!(n, 2);
    assert!(sink.finished);

    // Binding order is layout order; values are destination-encoded.
    assert_eq!(
        sink.rows[0],
        vec![
            PgValue::Date(date),
            PgValue::I64(3_000_000_000),
            PgValue::Text("widget".into()),
            PgValue::Decimal(Decimal::new(9950, 2)), // rescaled to (12,2)
            PgValue::Uuid(tag),
        ]
    );

    // NULLs propagate with destination type hints.
    assert_eq!(
        sink.rows[1],
        vec![
            PgValue::Null(PgNullType::Date),
            PgValue::I64(7),
            PgValue::Null(PgNullType::Text),
            PgValue::Decimal(Decimal::new(0, 2)),
            PgValue::Null(PgNullType::Uuid),
        ]
    );
}

#[tokio::test]
async fn unresolved_layout_column_fails_before_any_row() {
    init_tracing();
    let descriptors = vec![descriptor_from_column("id", &Type::INT4, -1)];
    let layout = ColumnLayout::new(vec![
        InputColumn::simple("id", 0, LogicalType::Int32),
        InputColumn::simple("ghost", 1, LogicalType::Int32),
    ]);

    let err = bind(&layout, &descriptors).unwrap_err();
    assert!(matches!(err, LoadError::UnresolvedColumn(name) if name == "ghost"));
}

#[tokio::test]
async fn oversized_text_poisons_batch_mid_stream() {
    init_tracing();
    let descriptors = vec![descriptor_from_column("label", &Type::VARCHAR, 4 + 4)];
    let layout = ColumnLayout::new(vec![InputColumn::simple("label", 0, LogicalType::WideText)]);
    let bindings = bind(&layout, &descriptors).unwrap();

    let mut rows = MemoryRows::new(vec![
        vec![Cell::Str("ok".into())],
        vec![Cell::Str("too long".into())],
        vec![Cell::Str("never reached".into())],
    ]);

    let mut sink = RecordingSink::new();
    let err = pump(&mut rows, &bindings, &mut sink).await.unwrap_err();
    match err {
        LoadError::Conversion { column, .. } => assert_eq!(column, "label"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sink.rows.len(), 1);
    assert!(!sink.finished);
}
