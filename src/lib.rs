//! # pg-destination
//!
//! Embeddable PostgreSQL destination loader for row-pipeline engines.
//!
//! The loader binds a pipeline's declared column layout to a destination
//! table by name, converts typed cells into native PostgreSQL values, and
//! delivers them with one of two strategies:
//!
//! - **Binary COPY streaming** for bulk throughput
//! - **Parameterized INSERT** per row for constrained environments
//!
//! Schema discovery, binding, conversion, and transaction control all fail
//! whole: a session never commits partial work.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pg_destination::events::TracingEvents;
//! use pg_destination::session::{connect, LoadSession};
//! use pg_destination::source::memory::{Cell, MemoryRows};
//! use pg_destination::source::{ColumnLayout, InputColumn};
//! use pg_destination::{DestinationConfig, LogicalType};
//!
//! #[tokio::main]
//! async fn main() -> pg_destination::Result<()> {
//!     let config = DestinationConfig::load("destination.yaml")?;
//!     let client = connect(&config.connection).await?;
//!
//!     let layout = ColumnLayout::new(vec![
//!         InputColumn::simple("id", 0, LogicalType::Int32),
//!         InputColumn::simple("name", 1, LogicalType::WideText),
//!     ]);
//!
//!     let events = Arc::new(TracingEvents);
//!     let mut session = LoadSession::begin(client, &config, &layout, events).await?;
//!
//!     let mut batch = MemoryRows::new(vec![
//!         vec![Cell::I32(1), Cell::Str("first".into())],
//!         vec![Cell::I32(2), Cell::Str("second".into())],
//!     ]);
//!     session.load_batch(&mut batch).await?;
//!     session.finish().await?;
//!     Ok(())
//! }
//! ```

pub mod bind;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod schema;
pub mod session;
pub mod source;
pub mod value;
pub mod writer;

// Re-exports for convenient access
pub use bind::{bind, ColumnBinding};
pub use config::{ConnectionConfig, DestinationConfig};
pub use error::{LoadError, Result};
pub use events::{EventSink, TracingEvents};
pub use schema::{describe, ColumnDescriptor, LogicalType};
pub use session::{acquire_connection, connect, LoadMode, LoadSession};
pub use source::{ColumnLayout, InputColumn, RowBuffer};
pub use value::{PgNullType, PgValue};
pub use writer::RowSink;
