use thiserror::Error;

use crate::types::BackendKind;

/// Opaque error produced by the wrapped engine or the remote session.
///
/// The adapter never reinterprets these beyond the kinds listed on
/// [`LedgerSqlError`]; they are surfaced through [`LedgerSqlError::Engine`].
pub type EngineError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum LedgerSqlError {
    /// `begin_tx` was called while a transaction is already active.
    #[error("nested transactions are not supported; finish the active transaction first")]
    NestedTransaction,

    /// A read-only flag or non-default isolation level was requested.
    #[error("unsupported transaction option: {0}")]
    UnsupportedTransactionOption(String),

    /// A query was attempted while the embedded backend holds an uncommitted batch.
    #[error("queries are not supported while a batched transaction is pending; query after commit")]
    NoQueryDuringBatchedTransaction,

    /// Commit or rollback was called with no active transaction.
    #[error("transaction has already been committed or rolled back")]
    TransactionAlreadyFinished,

    /// Two statements of one batched transaction bound the same explicit parameter name.
    #[error(
        "the named parameter {name} was bound by two statements of one transaction; parameter names must be unique across the batch"
    )]
    ParameterNameCollision { name: String },

    /// The liveness check failed; discard the connection and retry on a new one.
    #[error("bad connection")]
    BadConnection,

    /// Any operation on a connection after `close`.
    #[error("connection is closed")]
    ConnectionClosed,

    #[error("only a single statement may be present in a query")]
    QueriedMultipleStatements,

    #[error("tried to query a statement which is not a SELECT")]
    QueriedNonSelectStatement,

    /// A prepared statement was run on a connection of the other backend kind.
    #[error("statement was prepared on a {prepared:?} connection but run on a {connection:?} connection")]
    StatementBackendMismatch {
        prepared: BackendKind,
        connection: BackendKind,
    },

    #[error("operation canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("a configuration named {name} is already registered")]
    ConfigAlreadyRegistered { name: String },

    #[error("no configuration named {name} is registered")]
    ConfigNotRegistered { name: String },

    #[error("configuration registry is sealed")]
    RegistrySealed,

    #[error(transparent)]
    Engine(EngineError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl LedgerSqlError {
    /// Wrap an engine failure without reinterpreting it.
    pub fn engine(err: impl Into<EngineError>) -> Self {
        LedgerSqlError::Engine(err.into())
    }

    /// True when a pool should discard this connection.
    #[must_use]
    pub fn is_bad_connection(&self) -> bool {
        matches!(self, LedgerSqlError::BadConnection)
    }

    /// Only a bad connection is safe to retry, and only on a fresh connection.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_bad_connection()
    }
}

impl From<EngineError> for LedgerSqlError {
    fn from(err: EngineError) -> Self {
        LedgerSqlError::Engine(err)
    }
}
