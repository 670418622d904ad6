//! The narrow interfaces the adapter consumes from its external collaborators.
//!
//! The SQL parser/execution engine and the remote network session are not part
//! of this crate. They are reached only through the traits below:
//! - [`EmbeddedEngine`]: in-process engine that accepts a list of parsed statements
//!   plus named parameters as one atomic submission
//! - [`RemoteSession`] / [`NativeTransaction`]: remote server session with a
//!   native multi-statement transaction handle
//! - [`RowSource`]: lazy row cursor returned by either backend
//!
//! The connector opens backends through [`RemoteDialer`] and [`EmbeddedOpener`].

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::{EmbeddedConfig, RemoteOptions};
use crate::error::EngineError;
use crate::params::NamedParams;

/// The engine's tagged value representation.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    Null,
    Integer(i64),
    Varchar(String),
    Boolean(bool),
    Blob(Vec<u8>),
    /// Microseconds since the Unix epoch, UTC.
    Timestamp(i64),
    /// Untyped payload; decoded as raw bytes.
    Any(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Other,
}

/// One statement already parsed by the engine.
///
/// Placeholders inside `text` are numbered from 1 in order of appearance,
/// named and positional alike, which matches the caller's binding order. The
/// engine resolves a positional placeholder numbered k to the parameter named
/// `param<positional_base + k>`. The batch merger raises the base when it
/// shifts a statement's ordinals so the renumbered parameters stay addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatement {
    text: String,
    kind: StatementKind,
    positional_base: usize,
}

impl ParsedStatement {
    #[must_use]
    pub fn new(text: impl Into<String>, kind: StatementKind) -> Self {
        Self {
            text: text.into(),
            kind,
            positional_base: 0,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    #[must_use]
    pub fn is_select(&self) -> bool {
        self.kind == StatementKind::Select
    }

    #[must_use]
    pub fn positional_base(&self) -> usize {
        self.positional_base
    }

    /// Copy of this statement whose positional placeholders start after `shift`.
    #[must_use]
    pub fn shifted(&self, shift: usize) -> Self {
        Self {
            text: self.text.clone(),
            kind: self.kind,
            positional_base: self.positional_base + shift,
        }
    }

    /// Parameter name the k-th (1-based) positional placeholder binds to.
    #[must_use]
    pub fn positional_name(&self, k: usize) -> String {
        crate::params::positional_name(self.positional_base + k)
    }
}

/// Summary the engine reports once per commit.
///
/// `last_inserted_pks` has one entry per table with an autoincrement column that
/// received rows anywhere in the transaction; it carries no statement order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitAggregate {
    pub updated_rows: u64,
    pub last_inserted_pks: HashMap<String, i64>,
}

impl CommitAggregate {
    #[must_use]
    pub fn new(updated_rows: u64, last_inserted_pks: HashMap<String, i64>) -> Self {
        Self {
            updated_rows,
            last_inserted_pks,
        }
    }
}

/// Column metadata reported by a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Name as reported, possibly aliased like `(db.table.column)`.
    pub name: String,
    /// Engine type name, e.g. `INTEGER`, `VARCHAR`.
    pub type_name: String,
    /// Key addressing this column's value inside an [`EngineRow`].
    pub selector: String,
}

/// One decoded row, addressed by column selector rather than position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineRow {
    pub values: HashMap<String, EngineValue>,
}

/// Lazy, pull-based cursor over a query result.
#[async_trait]
pub trait RowSource: Send {
    fn columns(&self) -> Result<Vec<ColumnDescriptor>, EngineError>;

    /// Next row, or `None` once the cursor is exhausted.
    async fn read(&mut self) -> Result<Option<EngineRow>, EngineError>;

    async fn close(&mut self) -> Result<(), EngineError>;
}

/// In-process engine whose only write primitive is one atomic multi-statement submission.
#[async_trait]
pub trait EmbeddedEngine: Send + Sync {
    fn parse(&self, sql: &str) -> Result<Vec<ParsedStatement>, EngineError>;

    /// Execute all statements as one unit; one aggregate per engine commit.
    async fn exec_prepared(
        &mut self,
        statements: &[ParsedStatement],
        params: &NamedParams,
    ) -> Result<Vec<CommitAggregate>, EngineError>;

    async fn query_prepared(
        &mut self,
        statement: &ParsedStatement,
        params: &NamedParams,
    ) -> Result<Box<dyn RowSource>, EngineError>;

    async fn exist_table(&self, name: &str) -> Result<bool, EngineError>;

    async fn exist_database(&self, name: &str) -> Result<bool, EngineError>;

    async fn create_database(&mut self, name: &str) -> Result<(), EngineError>;

    async fn use_database(&mut self, name: &str) -> Result<(), EngineError>;

    async fn close(&mut self) -> Result<(), EngineError>;
}

/// Authenticated session against a remote ledger server.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn health_check(&self) -> Result<(), EngineError>;

    /// Execute outside any client transaction; one aggregate per server commit.
    async fn sql_exec(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Vec<CommitAggregate>, EngineError>;

    async fn sql_query(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Box<dyn RowSource>, EngineError>;

    /// Send BEGIN and return the server-side transaction handle.
    async fn new_tx(&mut self) -> Result<Box<dyn NativeTransaction>, EngineError>;

    async fn list_tables(&mut self) -> Result<Vec<String>, EngineError>;

    async fn disconnect(&mut self) -> Result<(), EngineError>;
}

/// Server-side transaction handle, valid until commit, rollback or cancel.
#[async_trait]
pub trait NativeTransaction: Send + Sync {
    async fn exec(&mut self, sql: &str, params: &NamedParams) -> Result<(), EngineError>;

    async fn query(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Box<dyn RowSource>, EngineError>;

    /// Running aggregate of every statement executed on this handle so far.
    fn aggregate(&self) -> CommitAggregate;

    async fn commit(&mut self) -> Result<CommitAggregate, EngineError>;

    async fn rollback(&mut self) -> Result<(), EngineError>;

    /// Release server-side resources after a failed or abandoned commit/rollback.
    async fn cancel(&mut self) -> Result<(), EngineError>;
}

/// Opens authenticated remote sessions.
#[async_trait]
pub trait RemoteDialer: Send + Sync {
    async fn dial(&self, options: &RemoteOptions) -> Result<Box<dyn RemoteSession>, EngineError>;
}

/// Opens (and readies the catalog of) embedded engines.
#[async_trait]
pub trait EmbeddedOpener: Send + Sync {
    async fn open(&self, config: &EmbeddedConfig) -> Result<Box<dyn EmbeddedEngine>, EngineError>;
}
