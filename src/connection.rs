//! The connection facade: one backend handle plus its transaction slot.

pub(crate) mod backend;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::context::CallContext;
use crate::engine::{EmbeddedEngine, ParsedStatement, RemoteSession};
use crate::error::LedgerSqlError;
use crate::params::Param;
use crate::rows::Rows;
use crate::transaction::reconcile::ExecResult;
use crate::transaction::{ExecOutcome, TransactionCoordinator, TxOptions};
use crate::types::BackendKind;

use backend::Backend;

/// A statement prepared on a connection.
///
/// The remote backend keeps only the text; the embedded backend parses it up
/// front so syntax errors surface at prepare time.
///
/// A statement only runs on a connection of the backend kind that prepared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    query: String,
    backend: BackendKind,
    parsed: Vec<ParsedStatement>,
}

impl Statement {
    pub(crate) fn unparsed(query: &str) -> Self {
        Self {
            query: query.to_owned(),
            backend: BackendKind::Remote,
            parsed: Vec::new(),
        }
    }

    pub(crate) fn with_statements(query: &str, parsed: Vec<ParsedStatement>) -> Self {
        Self {
            query: query.to_owned(),
            backend: BackendKind::Embedded,
            parsed,
        }
    }

    /// Backend kind of the connection that prepared this statement.
    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Engine-parsed statements; empty for the remote backend.
    #[must_use]
    pub fn statements(&self) -> &[ParsedStatement] {
        &self.parsed
    }

    /// Number of placeholders, when known. The engine does not report it.
    #[must_use]
    pub fn num_input(&self) -> Option<usize> {
        None
    }

    /// Nothing is held server-side for a prepared statement.
    pub fn close(self) {}
}

/// A connection to a ledger SQL engine, either a remote session or an
/// embedded engine.
///
/// Not internally synchronized: every call takes `&mut self`. Use
/// [`LedgerPool`](crate::pool::LedgerPool) to share connections across tasks.
pub struct Connection {
    backend: Backend,
    tx: TransactionCoordinator,
    closed: bool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend.kind())
            .field("in_transaction", &self.tx.is_active())
            .field("closed", &self.closed)
            .finish()
    }
}

impl Connection {
    /// Wrap an already authenticated remote session.
    #[must_use]
    pub fn from_remote(session: Box<dyn RemoteSession>) -> Self {
        Self::new(Backend::Remote(session))
    }

    /// Wrap an embedded engine whose database is already selected.
    #[must_use]
    pub fn from_embedded(engine: Box<dyn EmbeddedEngine>) -> Self {
        Self::new(Backend::Embedded(engine))
    }

    fn new(backend: Backend) -> Self {
        Self {
            backend,
            tx: TransactionCoordinator::default(),
            closed: false,
        }
    }

    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx.is_active()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), LedgerSqlError> {
        if self.closed {
            return Err(LedgerSqlError::ConnectionClosed);
        }
        Ok(())
    }

    fn ensure_prepared_here(&self, stmt: &Statement) -> Result<(), LedgerSqlError> {
        let connection = self.backend.kind();
        if stmt.backend() != connection {
            return Err(LedgerSqlError::StatementBackendMismatch {
                prepared: stmt.backend(),
                connection,
            });
        }
        Ok(())
    }

    /// # Errors
    /// `ConnectionClosed`, or the engine's parse error (embedded backend).
    pub fn prepare(&self, query: &str) -> Result<Statement, LedgerSqlError> {
        self.ensure_open()?;
        self.backend.prepare(query)
    }

    /// Start a transaction.
    ///
    /// # Errors
    /// `NestedTransaction` while one is active (it stays usable),
    /// `UnsupportedTransactionOption` for read-only or non-default isolation,
    /// or the engine's error from BEGIN.
    pub async fn begin_tx(
        &mut self,
        ctx: &CallContext,
        options: TxOptions,
    ) -> Result<(), LedgerSqlError> {
        self.ensure_open()?;
        self.tx.begin(&mut self.backend, options, ctx).await
    }

    /// Prepare and execute `query`.
    ///
    /// Inside an embedded-backend transaction the statement is only queued and
    /// [`ExecOutcome::Deferred`] is returned; rows affected for the whole batch
    /// are reported by [`commit`](Connection::commit).
    ///
    /// # Errors
    /// Parameter, parse and engine errors.
    pub async fn exec(
        &mut self,
        ctx: &CallContext,
        query: &str,
        params: &[Param],
    ) -> Result<ExecOutcome, LedgerSqlError> {
        let stmt = self.prepare(query)?;
        self.exec_prepared(ctx, &stmt, params).await
    }

    /// # Errors
    /// `StatementBackendMismatch` when `stmt` was prepared on the other
    /// backend kind, or parameter and engine errors.
    pub async fn exec_prepared(
        &mut self,
        ctx: &CallContext,
        stmt: &Statement,
        params: &[Param],
    ) -> Result<ExecOutcome, LedgerSqlError> {
        self.ensure_open()?;
        self.ensure_prepared_here(stmt)?;
        self.tx.exec(&mut self.backend, stmt, params, ctx).await
    }

    /// Prepare and run a query.
    ///
    /// # Errors
    /// `NoQueryDuringBatchedTransaction` inside an embedded-backend
    /// transaction; on the embedded backend `QueriedMultipleStatements` or
    /// `QueriedNonSelectStatement` unless `query` is a single SELECT.
    pub async fn query(
        &mut self,
        ctx: &CallContext,
        query: &str,
        params: &[Param],
    ) -> Result<Rows, LedgerSqlError> {
        let stmt = self.prepare(query)?;
        self.query_prepared(ctx, &stmt, params).await
    }

    /// # Errors
    /// Same as [`Connection::query`].
    pub async fn query_prepared(
        &mut self,
        ctx: &CallContext,
        stmt: &Statement,
        params: &[Param],
    ) -> Result<Rows, LedgerSqlError> {
        self.ensure_open()?;
        self.ensure_prepared_here(stmt)?;
        self.tx.query(&mut self.backend, stmt, params, ctx).await
    }

    /// Commit the active transaction. It is finished afterwards even on error.
    ///
    /// # Errors
    /// `TransactionAlreadyFinished` without an active transaction,
    /// `ParameterNameCollision` when batched statements share a name, or the
    /// engine's error.
    pub async fn commit(&mut self, ctx: &CallContext) -> Result<ExecResult, LedgerSqlError> {
        self.ensure_open()?;
        self.tx.commit(&mut self.backend, ctx).await
    }

    /// # Errors
    /// `TransactionAlreadyFinished` without an active transaction, or the
    /// engine's error from ROLLBACK.
    pub async fn rollback(&mut self, ctx: &CallContext) -> Result<(), LedgerSqlError> {
        self.ensure_open()?;
        self.tx.rollback(ctx).await
    }

    /// # Errors
    /// `BadConnection` when the remote session is gone or unhealthy.
    pub async fn ping(&self, ctx: &CallContext) -> Result<(), LedgerSqlError> {
        self.ensure_open()?;
        ctx.run(self.backend.ping()).await
    }

    /// Called before a pooled connection is reused. Nothing is reset; the
    /// session is only checked for liveness.
    ///
    /// # Errors
    /// `BadConnection` when the remote session is disconnected.
    pub async fn reset_session(&mut self, ctx: &CallContext) -> Result<(), LedgerSqlError> {
        self.ensure_open()?;
        ctx.check()?;
        if self.backend.is_connected() {
            Ok(())
        } else {
            Err(LedgerSqlError::BadConnection)
        }
    }

    /// Abandon any active transaction, rolling a native one back. Returns
    /// whether there was one.
    pub(crate) async fn abandon_transaction(&mut self) -> bool {
        self.tx.abandon().await
    }

    /// Release the backend handle. Later calls are no-ops.
    ///
    /// # Errors
    /// The engine's error from the first close.
    #[instrument(level = "debug", skip_all, fields(backend = ?self.backend.kind()))]
    pub async fn close(&mut self) -> Result<(), LedgerSqlError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.tx.abandon().await {
            warn!("connection closed with an active transaction");
        }
        let res = self.backend.close().await;
        match &res {
            Ok(()) => info!("connection closed"),
            Err(err) => debug!(error = %err, "closing connection failed"),
        }
        res
    }
}

/// Ledger-specific operations beyond the generic statement API.
#[async_trait]
pub trait LedgerConnExt {
    /// Whether the selected database has a table named `name`.
    async fn exist_table(&mut self, ctx: &CallContext, name: &str) -> Result<bool, LedgerSqlError>;
}

#[async_trait]
impl LedgerConnExt for Connection {
    async fn exist_table(&mut self, ctx: &CallContext, name: &str) -> Result<bool, LedgerSqlError> {
        self.ensure_open()?;
        ctx.run(self.backend.exist_table(name)).await
    }
}
