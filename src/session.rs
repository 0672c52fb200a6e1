//! Load session lifecycle and transaction control.
//!
//! A [`LoadSession`] owns the destination connection for the duration of one
//! load: it validates configuration, discovers the destination schema, binds
//! the source layout, and drives batches through the configured strategy
//! under an optional session-scoped transaction.
//!
//! Transaction control is explicit `BEGIN`/`COMMIT`/`ROLLBACK` on the
//! session's own connection. Which statement each lifecycle event requires
//! is decided by the [`TxnControl`] state machine; the session only executes
//! the decision. Any failure after `BEGIN` rolls back; a session never
//! commits partial work.

use std::sync::Arc;

use tokio_postgres::{Client, NoTls, Statement};
use tracing::{error, info};

use crate::bind::{bind, ColumnBinding};
use crate::config::{ConnectionConfig, DestinationConfig};
use crate::error::{LoadError, Result};
use crate::events::EventSink;
use crate::schema::describe;
use crate::source::{ColumnLayout, RowBuffer};
use crate::writer::{
    build_copy_sql, build_insert_sql, ensure_binary_support, pump, CopySink, InsertSink,
};

/// Open a new destination connection.
pub async fn connect(config: &ConnectionConfig) -> Result<Client> {
    let (client, connection) = tokio_postgres::connect(&config.connection_string(), NoTls)
        .await
        .map_err(|e| LoadError::Connection(format!("connect failed: {}", e)))?;

    // The connection object drives the socket until the client drops.
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("destination connection error: {}", e);
        }
    });

    info!(
        "connected to destination {}:{}/{}",
        config.host, config.port, config.database
    );
    Ok(client)
}

/// Reuse an existing connection when it is still live, otherwise open a new
/// one. Lets the embedding engine hold a connection across sessions.
pub async fn acquire_connection(
    config: &ConnectionConfig,
    existing: Option<Client>,
) -> Result<Client> {
    if let Some(client) = existing {
        if !client.is_closed() {
            return Ok(client);
        }
    }
    connect(config).await
}

/// How rows reach the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Binary COPY streaming, one COPY operation per batch.
    Copy,
    /// Parameterized INSERT, one statement execution per row.
    Insert,
}

impl LoadMode {
    fn from_config(config: &DestinationConfig) -> Self {
        if config.perform_copy {
            LoadMode::Copy
        } else {
            LoadMode::Insert
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    /// No session transaction (per-statement durability).
    None,
    Open,
    Completed,
}

/// What the session must run against the connection next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnAction {
    Commit,
    Rollback,
    Nothing,
}

/// Transaction and failure state machine for one session.
///
/// Pure decisions, no connection access: each lifecycle event returns the
/// statement the session must execute. A transaction completes at most once,
/// in one direction.
#[derive(Debug, Clone, Copy)]
struct TxnControl {
    txn: TxnState,
    failed: bool,
}

impl TxnControl {
    fn new() -> Self {
        Self {
            txn: TxnState::None,
            failed: false,
        }
    }

    /// A `BEGIN` was executed.
    fn opened(&mut self) {
        self.txn = TxnState::Open;
    }

    /// A failed session refuses further batches.
    fn accepts_batches(&self) -> bool {
        !self.failed
    }

    /// Record a failure (setup or batch). Rolls back at most once.
    fn fail(&mut self) -> TxnAction {
        self.failed = true;
        self.close_open()
    }

    /// Session end: commit exactly once, unless the session failed, in
    /// which case any still-open transaction rolls back instead.
    fn complete(&mut self) -> TxnAction {
        if self.failed {
            return self.close_open();
        }
        if self.txn == TxnState::Open {
            self.txn = TxnState::Completed;
            TxnAction::Commit
        } else {
            TxnAction::Nothing
        }
    }

    fn close_open(&mut self) -> TxnAction {
        if self.txn == TxnState::Open {
            self.txn = TxnState::Completed;
            TxnAction::Rollback
        } else {
            TxnAction::Nothing
        }
    }
}

/// One load into one destination table over one connection.
pub struct LoadSession {
    client: Client,
    table: String,
    mode: LoadMode,
    bindings: Vec<ColumnBinding>,
    insert_stmt: Option<Statement>,
    copy_sql: Option<String>,
    control: TxnControl,
    rows_loaded: u64,
    events: Arc<dyn EventSink>,
}

impl LoadSession {
    /// Set up a session: validate, discover the destination schema, bind the
    /// layout, open the transaction, and prepare the load strategy.
    ///
    /// Setup failures after `BEGIN` roll the transaction back before the
    /// error propagates, so a broken setup leaves nothing open.
    pub async fn begin(
        client: Client,
        config: &DestinationConfig,
        layout: &ColumnLayout,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;

        // Read-only steps come before BEGIN.
        let descriptors = describe(&client, &config.table_name).await?;
        let bindings = bind(layout, &descriptors)?;
        let mode = LoadMode::from_config(config);

        let mut session = Self {
            client,
            table: config.table_name.clone(),
            mode,
            bindings,
            insert_stmt: None,
            copy_sql: None,
            control: TxnControl::new(),
            rows_loaded: 0,
            events,
        };

        if config.perform_as_transaction {
            session
                .client
                .simple_query("BEGIN")
                .await
                .map_err(|e| LoadError::transaction("begin", e.to_string()))?;
            session.control.opened();
        }

        if let Err(e) = session.prepare_strategy().await {
            session.handle_failure().await;
            return Err(e);
        }

        session.events.info(&format!(
            "setup: table {} ready, {} columns bound, {:?} mode",
            session.table,
            session.bindings.len(),
            session.mode
        ));
        Ok(session)
    }

    async fn prepare_strategy(&mut self) -> Result<()> {
        match self.mode {
            LoadMode::Insert => {
                let sql = build_insert_sql(&self.table, &self.bindings);
                let stmt = self
                    .client
                    .prepare(&sql)
                    .await
                    .map_err(|e| LoadError::load(&self.table, format!("prepare failed: {}", e)))?;
                self.insert_stmt = Some(stmt);
            }
            LoadMode::Copy => {
                ensure_binary_support(&self.table, &self.bindings)?;
                self.copy_sql = Some(build_copy_sql(&self.table, &self.bindings));
            }
        }
        Ok(())
    }

    /// The bindings the session resolved at setup, in layout order.
    pub fn bindings(&self) -> &[ColumnBinding] {
        &self.bindings
    }

    /// Rows delivered across all completed batches.
    pub fn rows_loaded(&self) -> u64 {
        self.rows_loaded
    }

    /// Load one batch of rows from the source buffer.
    ///
    /// A batch error rolls back the session transaction and poisons the
    /// session; further batches are refused.
    pub async fn load_batch(&mut self, buffer: &mut dyn RowBuffer) -> Result<u64> {
        if !self.control.accepts_batches() {
            return Err(LoadError::load(
                &self.table,
                "session already failed; batch refused",
            ));
        }

        let result = match self.mode {
            LoadMode::Insert => {
                // Statement handles are reference-counted; the prepare
                // happened once at setup.
                let stmt = self.insert_stmt.clone().ok_or_else(|| {
                    LoadError::load(&self.table, "insert statement not prepared")
                })?;
                let mut sink = InsertSink::new(&self.client, stmt, &self.table);
                pump(buffer, &self.bindings, &mut sink).await
            }
            LoadMode::Copy => {
                let copy_sql = self.copy_sql.clone().ok_or_else(|| {
                    LoadError::load(&self.table, "copy statement not prepared")
                })?;
                let mut sink = CopySink::open(&self.client, &self.table, &copy_sql).await?;
                pump(buffer, &self.bindings, &mut sink).await
            }
        };

        match result {
            Ok(n) => {
                self.rows_loaded += n;
                self.events
                    .info(&format!("load: {} rows into table {}", n, self.table));
                Ok(n)
            }
            Err(e) => {
                self.handle_failure().await;
                Err(e)
            }
        }
    }

    /// Complete the session and release the connection.
    ///
    /// Commits the session transaction if it is still open; a session that
    /// has failed rolls back instead, and the connection still comes back
    /// for reuse. A commit failure closes the connection rather than
    /// handing back a client parked in a failed transaction.
    pub async fn finish(mut self) -> Result<Client> {
        match self.control.complete() {
            TxnAction::Commit => {
                self.client
                    .simple_query("COMMIT")
                    .await
                    .map_err(|e| LoadError::transaction("commit", e.to_string()))?;
                self.events.info(&format!(
                    "finish: committed {} rows into table {}",
                    self.rows_loaded, self.table
                ));
            }
            TxnAction::Rollback => self.run_rollback().await,
            TxnAction::Nothing => {}
        }

        Ok(self.client)
    }

    /// Record a failure and execute the rollback it requires, if any. A
    /// rollback failure is reported through the event sink; the original
    /// error stays primary.
    async fn handle_failure(&mut self) {
        if self.control.fail() == TxnAction::Rollback {
            self.run_rollback().await;
        }
    }

    async fn run_rollback(&mut self) {
        if let Err(e) = self.client.simple_query("ROLLBACK").await {
            self.events
                .error(&format!("rollback failed for table {}: {}", self.table, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(copy: bool) -> DestinationConfig {
        DestinationConfig::from_yaml(&format!(
            r#"
connection:
  host: localhost
  database: warehouse
  user: loader
  password: secret
table_name: orders
perform_copy: {}
"#,
            copy
        ))
        .unwrap()
    }

    #[test]
    fn test_load_mode_from_config() {
        assert_eq!(LoadMode::from_config(&config(true)), LoadMode::Copy);
        assert_eq!(LoadMode::from_config(&config(false)), LoadMode::Insert);
    }

    #[test]
    fn test_setup_failure_rolls_back_and_leaves_nothing_open() {
        let mut control = TxnControl::new();
        control.opened();
        assert_eq!(control.fail(), TxnAction::Rollback);
        // Nothing left open for session end to act on.
        assert_eq!(control.complete(), TxnAction::Nothing);
    }

    #[test]
    fn test_batch_failure_poisons_session() {
        let mut control = TxnControl::new();
        control.opened();
        assert!(control.accepts_batches());

        assert_eq!(control.fail(), TxnAction::Rollback);
        assert!(!control.accepts_batches());
        // A second failure has nothing left to roll back.
        assert_eq!(control.fail(), TxnAction::Nothing);
    }

    #[test]
    fn test_commit_exactly_once() {
        let mut control = TxnControl::new();
        control.opened();
        assert_eq!(control.complete(), TxnAction::Commit);
        assert_eq!(control.complete(), TxnAction::Nothing);
    }

    #[test]
    fn test_failed_session_never_commits() {
        let mut control = TxnControl::new();
        control.opened();
        control.fail();
        assert_eq!(control.complete(), TxnAction::Nothing);

        // Failure between open and completion still rolls back at the end.
        let mut control = TxnControl::new();
        control.opened();
        control.failed = true;
        assert_eq!(control.complete(), TxnAction::Rollback);
    }

    #[test]
    fn test_per_statement_mode_needs_no_transaction_statements() {
        let mut control = TxnControl::new();
        assert!(control.accepts_batches());
        assert_eq!(control.fail(), TxnAction::Nothing);
        assert_eq!(control.complete(), TxnAction::Nothing);

        let mut control = TxnControl::new();
        assert_eq!(control.complete(), TxnAction::Nothing);
    }
}
