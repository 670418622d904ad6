use tracing::debug;

use crate::engine::{CommitAggregate, EmbeddedEngine, RemoteSession, RowSource};
use crate::error::LedgerSqlError;
use crate::params::NamedParams;
use crate::types::BackendKind;

use super::Statement;

/// The engine handle a connection owns.
pub(crate) enum Backend {
    Remote(Box<dyn RemoteSession>),
    Embedded(Box<dyn EmbeddedEngine>),
}

impl Backend {
    pub(crate) fn kind(&self) -> BackendKind {
        match self {
            Backend::Remote(_) => BackendKind::Remote,
            Backend::Embedded(_) => BackendKind::Embedded,
        }
    }

    pub(crate) fn prepare(&self, query: &str) -> Result<Statement, LedgerSqlError> {
        match self {
            Backend::Remote(_) => Ok(Statement::unparsed(query)),
            Backend::Embedded(engine) => {
                let parsed = engine.parse(query).map_err(LedgerSqlError::Engine)?;
                Ok(Statement::with_statements(query, parsed))
            }
        }
    }

    /// Autocommitted execution outside any transaction.
    pub(crate) async fn exec_direct(
        &mut self,
        stmt: &Statement,
        params: &NamedParams,
    ) -> Result<Vec<CommitAggregate>, LedgerSqlError> {
        let aggregates = match self {
            Backend::Remote(session) => session.sql_exec(stmt.query(), params).await,
            Backend::Embedded(engine) => engine.exec_prepared(stmt.statements(), params).await,
        };
        aggregates.map_err(LedgerSqlError::Engine)
    }

    pub(crate) async fn query_direct(
        &mut self,
        stmt: &Statement,
        params: &NamedParams,
    ) -> Result<Box<dyn RowSource>, LedgerSqlError> {
        match self {
            Backend::Remote(session) => session
                .sql_query(stmt.query(), params)
                .await
                .map_err(LedgerSqlError::Engine),
            Backend::Embedded(engine) => {
                let select = match stmt.statements() {
                    [only] if only.is_select() => only,
                    [_] | [] => return Err(LedgerSqlError::QueriedNonSelectStatement),
                    _ => return Err(LedgerSqlError::QueriedMultipleStatements),
                };
                engine
                    .query_prepared(select, params)
                    .await
                    .map_err(LedgerSqlError::Engine)
            }
        }
    }

    /// Liveness only; the embedded engine has no session to lose.
    pub(crate) async fn ping(&self) -> Result<(), LedgerSqlError> {
        match self {
            Backend::Remote(session) => {
                if !session.is_connected() {
                    debug!("ping: session disconnected");
                    return Err(LedgerSqlError::BadConnection);
                }
                session.health_check().await.map_err(|err| {
                    debug!(error = %err, "ping: health check failed");
                    LedgerSqlError::BadConnection
                })
            }
            Backend::Embedded(_) => Ok(()),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        match self {
            Backend::Remote(session) => session.is_connected(),
            Backend::Embedded(_) => true,
        }
    }

    pub(crate) async fn exist_table(&mut self, name: &str) -> Result<bool, LedgerSqlError> {
        match self {
            Backend::Remote(session) => {
                let tables = session.list_tables().await.map_err(LedgerSqlError::Engine)?;
                Ok(tables.iter().any(|table| table == name))
            }
            Backend::Embedded(engine) => {
                engine.exist_table(name).await.map_err(LedgerSqlError::Engine)
            }
        }
    }

    pub(crate) async fn close(&mut self) -> Result<(), LedgerSqlError> {
        let closed = match self {
            Backend::Remote(session) => session.disconnect().await,
            Backend::Embedded(engine) => engine.close().await,
        };
        closed.map_err(LedgerSqlError::Engine)
    }
}
