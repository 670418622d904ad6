//! Per-connection transaction state machine.
//!
//! A connection is Idle or Active. The remote backend holds a native
//! transaction handle while Active; the embedded backend can only submit one
//! atomic batch, so it accumulates [`StatementPart`]s and submits them on
//! commit. Both live behind [`TransactionCoordinator`] as an
//! [`ActiveTransaction`] variant.

pub mod merge;
pub mod reconcile;

use tracing::{debug, instrument, warn};

use crate::connection::backend::Backend;
use crate::connection::Statement;
use crate::context::CallContext;
use crate::engine::{NativeTransaction, ParsedStatement};
use crate::error::LedgerSqlError;
use crate::params::{Param, bind};
use crate::rows::Rows;

use merge::merge_parts;
use reconcile::{ExecResult, from_aggregates, from_snapshots};

/// Isolation levels a caller may request; only `Default` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    WriteCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
    Linearizable,
}

/// Options for [`Connection::begin_tx`](crate::Connection::begin_tx).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TxOptions {
    #[must_use]
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// # Errors
    /// `UnsupportedTransactionOption` for read-only or non-default isolation.
    pub fn validate(&self) -> Result<(), LedgerSqlError> {
        if self.read_only {
            return Err(LedgerSqlError::UnsupportedTransactionOption(
                "read-only transactions".into(),
            ));
        }
        if self.isolation != IsolationLevel::Default {
            return Err(LedgerSqlError::UnsupportedTransactionOption(format!(
                "isolation level {:?}",
                self.isolation
            )));
        }
        Ok(())
    }
}

/// One exec accumulated by an emulated transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementPart {
    pub statements: Vec<ParsedStatement>,
    pub params: Vec<Param>,
}

impl StatementPart {
    #[must_use]
    pub fn new(statements: Vec<ParsedStatement>, params: Vec<Param>) -> Self {
        Self { statements, params }
    }
}

pub(crate) enum ActiveTransaction {
    Native(Box<dyn NativeTransaction>),
    Emulated(Vec<StatementPart>),
}

/// What an exec call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    Executed(ExecResult),
    /// Accumulated into an emulated transaction; nothing reached the engine.
    Deferred,
}

impl ExecOutcome {
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, ExecOutcome::Deferred)
    }

    #[must_use]
    pub fn result(&self) -> Option<ExecResult> {
        match self {
            ExecOutcome::Executed(res) => Some(*res),
            ExecOutcome::Deferred => None,
        }
    }

    #[must_use]
    pub fn rows_affected(&self) -> Option<u64> {
        self.result().map(|r| r.rows_affected())
    }
}

#[derive(Default)]
pub(crate) struct TransactionCoordinator {
    active: Option<ActiveTransaction>,
}

impl TransactionCoordinator {
    pub(crate) fn is_active(&self) -> bool {
        self.active.is_some()
    }

    #[instrument(level = "debug", skip_all, fields(backend = ?backend.kind()))]
    pub(crate) async fn begin(
        &mut self,
        backend: &mut Backend,
        options: TxOptions,
        ctx: &CallContext,
    ) -> Result<(), LedgerSqlError> {
        if self.active.is_some() {
            return Err(LedgerSqlError::NestedTransaction);
        }
        options.validate()?;
        let active = match backend {
            Backend::Remote(session) => {
                let handle = ctx
                    .run(async { session.new_tx().await.map_err(LedgerSqlError::Engine) })
                    .await?;
                ActiveTransaction::Native(handle)
            }
            Backend::Embedded(_) => ActiveTransaction::Emulated(Vec::new()),
        };
        self.active = Some(active);
        debug!("transaction started");
        Ok(())
    }

    pub(crate) async fn exec(
        &mut self,
        backend: &mut Backend,
        stmt: &Statement,
        params: &[Param],
        ctx: &CallContext,
    ) -> Result<ExecOutcome, LedgerSqlError> {
        match &mut self.active {
            Some(ActiveTransaction::Emulated(parts)) => {
                // Bind now so bad values fail at the exec that supplied them.
                bind(params)?;
                parts.push(StatementPart::new(stmt.statements().to_vec(), params.to_vec()));
                Ok(ExecOutcome::Deferred)
            }
            Some(ActiveTransaction::Native(handle)) => {
                let named = bind(params)?;
                let before = handle.aggregate();
                ctx.run(async {
                    handle
                        .exec(stmt.query(), &named)
                        .await
                        .map_err(LedgerSqlError::Engine)
                })
                .await?;
                Ok(ExecOutcome::Executed(from_snapshots(
                    &before,
                    &handle.aggregate(),
                )))
            }
            None => {
                let named = bind(params)?;
                let aggregates = ctx.run(backend.exec_direct(stmt, &named)).await?;
                Ok(ExecOutcome::Executed(from_aggregates(&aggregates)))
            }
        }
    }

    pub(crate) async fn query(
        &mut self,
        backend: &mut Backend,
        stmt: &Statement,
        params: &[Param],
        ctx: &CallContext,
    ) -> Result<Rows, LedgerSqlError> {
        let source = match &mut self.active {
            Some(ActiveTransaction::Emulated(_)) => {
                return Err(LedgerSqlError::NoQueryDuringBatchedTransaction);
            }
            Some(ActiveTransaction::Native(handle)) => {
                let named = bind(params)?;
                ctx.run(async {
                    handle
                        .query(stmt.query(), &named)
                        .await
                        .map_err(LedgerSqlError::Engine)
                })
                .await?
            }
            None => {
                let named = bind(params)?;
                ctx.run(backend.query_direct(stmt, &named)).await?
            }
        };
        Rows::new(source)
    }

    /// Finish the active transaction. The slot is empty afterwards whatever
    /// the outcome.
    #[instrument(level = "debug", skip_all)]
    pub(crate) async fn commit(
        &mut self,
        backend: &mut Backend,
        ctx: &CallContext,
    ) -> Result<ExecResult, LedgerSqlError> {
        let active = self
            .active
            .take()
            .ok_or(LedgerSqlError::TransactionAlreadyFinished)?;
        match active {
            ActiveTransaction::Emulated(parts) => {
                let batch = merge_parts(&parts)?;
                let named = bind(&batch.params)?;
                let Backend::Embedded(engine) = backend else {
                    return Err(LedgerSqlError::ExecutionError(
                        "batched transaction found on a remote connection".into(),
                    ));
                };
                let aggregates = ctx
                    .run(async {
                        engine
                            .exec_prepared(&batch.statements, &named)
                            .await
                            .map_err(LedgerSqlError::Engine)
                    })
                    .await?;
                let result = from_aggregates(&aggregates);
                debug!(rows_affected = result.rows_affected(), "batched transaction committed");
                Ok(result)
            }
            ActiveTransaction::Native(mut handle) => {
                let outcome = ctx
                    .run(async { handle.commit().await.map_err(LedgerSqlError::Engine) })
                    .await;
                match outcome {
                    Ok(aggregate) => {
                        debug!(rows_affected = aggregate.updated_rows, "transaction committed");
                        Ok(from_aggregates(std::slice::from_ref(&aggregate)))
                    }
                    Err(err) => {
                        cancel_handle(handle, "commit").await;
                        Err(err)
                    }
                }
            }
        }
    }

    #[instrument(level = "debug", skip_all)]
    pub(crate) async fn rollback(&mut self, ctx: &CallContext) -> Result<(), LedgerSqlError> {
        let active = self
            .active
            .take()
            .ok_or(LedgerSqlError::TransactionAlreadyFinished)?;
        match active {
            ActiveTransaction::Emulated(parts) => {
                debug!(parts = parts.len(), "discarded batched transaction");
                Ok(())
            }
            ActiveTransaction::Native(mut handle) => {
                let outcome = ctx
                    .run(async { handle.rollback().await.map_err(LedgerSqlError::Engine) })
                    .await;
                if outcome.is_err() {
                    cancel_handle(handle, "rollback").await;
                } else {
                    debug!("transaction rolled back");
                }
                outcome
            }
        }
    }

    /// Drop whatever transaction is active without reporting errors; used when
    /// a connection is closed or recycled mid-transaction.
    pub(crate) async fn abandon(&mut self) -> bool {
        match self.active.take() {
            None => false,
            Some(ActiveTransaction::Emulated(parts)) => {
                debug!(parts = parts.len(), "abandoned batched transaction");
                true
            }
            Some(ActiveTransaction::Native(mut handle)) => {
                if let Err(err) = handle.rollback().await {
                    warn!(error = %err, "rollback of abandoned transaction failed");
                    cancel_handle(handle, "abandon").await;
                }
                true
            }
        }
    }
}

async fn cancel_handle(mut handle: Box<dyn NativeTransaction>, after: &'static str) {
    match handle.cancel().await {
        Ok(()) => debug!(after, "transaction canceled"),
        Err(err) => warn!(after, error = %err, "canceling transaction failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_accepted() {
        assert!(TxOptions::default().validate().is_ok());
    }

    #[test]
    fn read_only_is_rejected() {
        let err = TxOptions::default().with_read_only(true).validate().unwrap_err();
        assert!(matches!(err, LedgerSqlError::UnsupportedTransactionOption(_)));
    }

    #[test]
    fn non_default_isolation_is_rejected() {
        for level in [
            IsolationLevel::ReadCommitted,
            IsolationLevel::Serializable,
            IsolationLevel::Snapshot,
        ] {
            let err = TxOptions::default()
                .with_isolation(level)
                .validate()
                .unwrap_err();
            assert!(matches!(err, LedgerSqlError::UnsupportedTransactionOption(ref m) if m.contains("isolation")));
        }
    }

    #[test]
    fn deferred_outcome_has_no_result() {
        assert!(ExecOutcome::Deferred.is_deferred());
        assert_eq!(ExecOutcome::Deferred.rows_affected(), None);
        let done = ExecOutcome::Executed(ExecResult::new(2, Some(5)));
        assert_eq!(done.rows_affected(), Some(2));
    }
}
