use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use async_trait::async_trait;
use regex::Regex;
use rusqlite::types::Value;

use crate::codec::type_names;
use crate::config::{EmbeddedConfig, RemoteOptions};
use crate::engine::{
    ColumnDescriptor, CommitAggregate, EmbeddedEngine, EmbeddedOpener, EngineRow, EngineValue,
    NativeTransaction, ParsedStatement, RemoteDialer, RemoteSession, RowSource, StatementKind,
};
use crate::error::EngineError;
use crate::params::{NamedParams, positional_name};

static INSERT_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*INSERT\s+INTO\s+"?(\w+)"#).expect("insert pattern compiles")
});

static FROM_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bFROM\s+"?(\w+)"#).expect("from pattern compiles"));

const DATABASES_TABLE: &str = "__ledger_databases";
const DEFAULT_FILE: &str = "ledger.sqlite3";

struct Inner {
    conn: rusqlite::Connection,
    database: String,
    connected: bool,
    healthy: bool,
    fail_next_commit: bool,
    fail_next_rollback: bool,
    fail_next_database_lookup: bool,
    cancels: usize,
    submissions: usize,
    closes: usize,
}

/// One SQLite database playing the ledger engine. Clones share it.
#[derive(Clone)]
pub struct SqliteLedger {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedger").finish_non_exhaustive()
    }
}

impl SqliteLedger {
    /// # Errors
    /// Returns the SQLite error if the in-memory database cannot be opened.
    pub fn in_memory() -> Result<Self, EngineError> {
        Self::from_connection(rusqlite::Connection::open_in_memory()?)
    }

    /// # Errors
    /// Returns the SQLite error if the file cannot be opened.
    pub fn open_file(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        Self::from_connection(rusqlite::Connection::open(path.into())?)
    }

    fn from_connection(conn: rusqlite::Connection) -> Result<Self, EngineError> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {DATABASES_TABLE} (name TEXT PRIMARY KEY)"
        ))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                conn,
                database: String::new(),
                connected: true,
                healthy: true,
                fail_next_commit: false,
                fail_next_rollback: false,
                fail_next_database_lookup: false,
                cancels: 0,
                submissions: 0,
                closes: 0,
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Run setup SQL directly, bypassing the adapter.
    ///
    /// # Errors
    /// Returns the SQLite error.
    pub fn execute_raw(&self, sql: &str) -> Result<(), EngineError> {
        self.lock().conn.execute_batch(sql)?;
        Ok(())
    }

    /// # Errors
    /// Returns the SQLite error, e.g. for an unknown table.
    pub fn count_rows(&self, table: &str) -> Result<i64, EngineError> {
        let inner = self.lock();
        let count = inner
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.lock().healthy = healthy;
    }

    pub fn fail_next_commit(&self) {
        self.lock().fail_next_commit = true;
    }

    pub fn fail_next_rollback(&self) {
        self.lock().fail_next_rollback = true;
    }

    /// Make the next `exist_database` call fail, as a broken catalog would.
    pub fn fail_next_database_lookup(&self) {
        self.lock().fail_next_database_lookup = true;
    }

    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.lock().cancels
    }

    /// Statements lists submitted through `exec_prepared` so far.
    #[must_use]
    pub fn submission_count(&self) -> usize {
        self.lock().submissions
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    #[must_use]
    pub fn database_in_use(&self) -> String {
        self.lock().database.clone()
    }

    fn table_exists(&self, name: &str) -> Result<bool, EngineError> {
        let inner = self.lock();
        let count: i64 = inner.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Run statements as one unit; rolled back entirely if any fails.
    fn submit(
        &self,
        statements: &[ParsedStatement],
        params: &NamedParams,
    ) -> Result<CommitAggregate, EngineError> {
        let mut inner = self.lock();
        inner.submissions += 1;
        let conn = &inner.conn;
        let own_tx = conn.is_autocommit();
        if own_tx {
            conn.execute_batch("BEGIN")?;
        }
        let mut aggregate = CommitAggregate::default();
        let outcome = statements
            .iter()
            .try_for_each(|stmt| run_statement(conn, stmt, params, &mut aggregate));
        match outcome {
            Ok(()) => {
                if own_tx {
                    conn.execute_batch("COMMIT")?;
                }
                Ok(aggregate)
            }
            Err(err) => {
                if own_tx {
                    conn.execute_batch("ROLLBACK")?;
                }
                Err(err)
            }
        }
    }

    fn select(
        &self,
        stmt: &ParsedStatement,
        params: &NamedParams,
    ) -> Result<Box<dyn RowSource>, EngineError> {
        let inner = self.lock();
        let rows = run_query(&inner.conn, &inner.database, stmt, params)?;
        Ok(Box::new(rows))
    }

    fn single_statement(&self, sql: &str) -> Result<ParsedStatement, EngineError> {
        let mut statements = split_statements(sql);
        match statements.len() {
            1 => Ok(statements.remove(0)),
            n => Err(format!("expected one statement, found {n}").into()),
        }
    }
}

#[async_trait]
impl EmbeddedEngine for SqliteLedger {
    fn parse(&self, sql: &str) -> Result<Vec<ParsedStatement>, EngineError> {
        let statements = split_statements(sql);
        if statements.is_empty() {
            return Err("empty statement".into());
        }
        Ok(statements)
    }

    async fn exec_prepared(
        &mut self,
        statements: &[ParsedStatement],
        params: &NamedParams,
    ) -> Result<Vec<CommitAggregate>, EngineError> {
        Ok(vec![self.submit(statements, params)?])
    }

    async fn query_prepared(
        &mut self,
        statement: &ParsedStatement,
        params: &NamedParams,
    ) -> Result<Box<dyn RowSource>, EngineError> {
        self.select(statement, params)
    }

    async fn exist_table(&self, name: &str) -> Result<bool, EngineError> {
        self.table_exists(name)
    }

    async fn exist_database(&self, name: &str) -> Result<bool, EngineError> {
        let mut inner = self.lock();
        if std::mem::take(&mut inner.fail_next_database_lookup) {
            return Err("injected catalog failure".into());
        }
        let count: i64 = inner.conn.query_row(
            &format!("SELECT COUNT(*) FROM {DATABASES_TABLE} WHERE name = ?1"),
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn create_database(&mut self, name: &str) -> Result<(), EngineError> {
        let inner = self.lock();
        inner.conn.execute(
            &format!("INSERT INTO {DATABASES_TABLE} (name) VALUES (?1)"),
            [name],
        )?;
        Ok(())
    }

    async fn use_database(&mut self, name: &str) -> Result<(), EngineError> {
        if !EmbeddedEngine::exist_database(self, name).await? {
            return Err(format!("database {name} does not exist").into());
        }
        self.lock().database = name.to_owned();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.lock().closes += 1;
        Ok(())
    }
}

#[async_trait]
impl RemoteSession for SqliteLedger {
    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn health_check(&self) -> Result<(), EngineError> {
        let inner = self.lock();
        if inner.connected && inner.healthy {
            Ok(())
        } else {
            Err("health check failed".into())
        }
    }

    async fn sql_exec(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Vec<CommitAggregate>, EngineError> {
        Ok(vec![self.submit(&split_statements(sql), params)?])
    }

    async fn sql_query(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Box<dyn RowSource>, EngineError> {
        let stmt = self.single_statement(sql)?;
        self.select(&stmt, params)
    }

    async fn new_tx(&mut self) -> Result<Box<dyn NativeTransaction>, EngineError> {
        self.lock().conn.execute_batch("BEGIN")?;
        Ok(Box::new(SqliteTx {
            ledger: self.clone(),
            aggregate: CommitAggregate::default(),
        }))
    }

    async fn list_tables(&mut self) -> Result<Vec<String>, EngineError> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '__ledger_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    async fn disconnect(&mut self) -> Result<(), EngineError> {
        let mut inner = self.lock();
        inner.connected = false;
        inner.closes += 1;
        Ok(())
    }
}

/// Native transaction over the ledger's SQLite connection.
pub struct SqliteTx {
    ledger: SqliteLedger,
    aggregate: CommitAggregate,
}

impl SqliteTx {
    fn end(&self, sql: &str) -> Result<(), EngineError> {
        let inner = self.ledger.lock();
        if !inner.conn.is_autocommit() {
            inner.conn.execute_batch(sql)?;
        }
        Ok(())
    }
}

#[async_trait]
impl NativeTransaction for SqliteTx {
    async fn exec(&mut self, sql: &str, params: &NamedParams) -> Result<(), EngineError> {
        let inner = self.ledger.lock();
        for stmt in split_statements(sql) {
            run_statement(&inner.conn, &stmt, params, &mut self.aggregate)?;
        }
        Ok(())
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Box<dyn RowSource>, EngineError> {
        let stmt = self.ledger.single_statement(sql)?;
        self.ledger.select(&stmt, params)
    }

    fn aggregate(&self) -> CommitAggregate {
        self.aggregate.clone()
    }

    async fn commit(&mut self) -> Result<CommitAggregate, EngineError> {
        if std::mem::take(&mut self.ledger.lock().fail_next_commit) {
            return Err("injected commit failure".into());
        }
        self.end("COMMIT")?;
        Ok(self.aggregate.clone())
    }

    async fn rollback(&mut self) -> Result<(), EngineError> {
        if std::mem::take(&mut self.ledger.lock().fail_next_rollback) {
            return Err("injected rollback failure".into());
        }
        self.end("ROLLBACK")
    }

    async fn cancel(&mut self) -> Result<(), EngineError> {
        self.ledger.lock().cancels += 1;
        self.end("ROLLBACK")
    }
}

/// Rows materialized from one SQLite query.
pub struct SqliteRows {
    columns: Vec<ColumnDescriptor>,
    rows: VecDeque<EngineRow>,
}

#[async_trait]
impl RowSource for SqliteRows {
    fn columns(&self) -> Result<Vec<ColumnDescriptor>, EngineError> {
        Ok(self.columns.clone())
    }

    async fn read(&mut self) -> Result<Option<EngineRow>, EngineError> {
        Ok(self.rows.pop_front())
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.rows.clear();
        Ok(())
    }
}

/// Hands out ledgers to the connector: one shared in-memory ledger, or a file
/// under each embedded configuration's data path.
#[derive(Clone, Default)]
pub struct SqliteLedgerFactory {
    shared: Option<SqliteLedger>,
    opened: Arc<Mutex<Vec<EmbeddedConfig>>>,
    dialed: Arc<Mutex<Vec<RemoteOptions>>>,
}

impl SqliteLedgerFactory {
    #[must_use]
    pub fn shared(ledger: SqliteLedger) -> Self {
        Self {
            shared: Some(ledger),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn on_disk() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn opened_configs(&self) -> Vec<EmbeddedConfig> {
        self.opened
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn dialed_options(&self) -> Vec<RemoteOptions> {
        self.dialed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EmbeddedOpener for SqliteLedgerFactory {
    async fn open(&self, config: &EmbeddedConfig) -> Result<Box<dyn EmbeddedEngine>, EngineError> {
        self.opened
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(config.clone());
        if let Some(ledger) = &self.shared {
            return Ok(Box::new(ledger.clone()));
        }
        tokio::fs::create_dir_all(&config.catalog_path).await?;
        tokio::fs::create_dir_all(&config.data_path).await?;
        Ok(Box::new(SqliteLedger::open_file(
            config.data_path.join(DEFAULT_FILE),
        )?))
    }
}

#[async_trait]
impl RemoteDialer for SqliteLedgerFactory {
    async fn dial(&self, options: &RemoteOptions) -> Result<Box<dyn RemoteSession>, EngineError> {
        self.dialed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(options.clone());
        let ledger = match &self.shared {
            Some(ledger) => ledger.clone(),
            None => SqliteLedger::in_memory()?,
        };
        ledger.set_connected(true);
        Ok(Box::new(ledger))
    }
}

/// Split on `;` outside single quotes.
fn split_statements(sql: &str) -> Vec<ParsedStatement> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for c in sql.chars() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            ';' if !in_quote => statements.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    statements.push(current);
    statements
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .map(|text| {
            let is_select = text
                .split_whitespace()
                .next()
                .is_some_and(|word| word.eq_ignore_ascii_case("SELECT"));
            let kind = if is_select {
                StatementKind::Select
            } else {
                StatementKind::Other
            };
            ParsedStatement::new(text, kind)
        })
        .collect()
}

/// Rewrite `?` to the named form the statement's positional base resolves to.
/// Named `@x` placeholders count towards the numbering but are kept.
fn rewrite_placeholders(sql: &str, base: usize) -> String {
    let mut out = String::with_capacity(sql.len() + 16);
    let mut k = 0;
    let mut in_quote = false;
    for c in sql.chars() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                out.push(c);
            }
            '?' if !in_quote => {
                k += 1;
                out.push('@');
                out.push_str(&positional_name(base + k));
            }
            '@' if !in_quote => {
                k += 1;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn to_sqlite(value: &EngineValue) -> Value {
    match value {
        EngineValue::Null => Value::Null,
        EngineValue::Integer(i) | EngineValue::Timestamp(i) => Value::Integer(*i),
        EngineValue::Varchar(s) => Value::Text(s.clone()),
        EngineValue::Boolean(b) => Value::Integer(i64::from(*b)),
        EngineValue::Blob(b) | EngineValue::Any(b) => Value::Blob(b.clone()),
    }
}

fn prepare_bound<'c>(
    conn: &'c rusqlite::Connection,
    stmt: &ParsedStatement,
    params: &NamedParams,
) -> Result<rusqlite::Statement<'c>, EngineError> {
    let sql = rewrite_placeholders(stmt.text(), stmt.positional_base());
    let mut prepared = conn.prepare(&sql)?;
    for idx in 1..=prepared.parameter_count() {
        let name = prepared
            .parameter_name(idx)
            .map(|n| n[1..].to_owned())
            .ok_or("anonymous placeholder")?;
        let value = params
            .get(&name)
            .ok_or_else(|| format!("no value bound for parameter {name}"))?;
        prepared.raw_bind_parameter(idx, to_sqlite(value))?;
    }
    Ok(prepared)
}

fn run_statement(
    conn: &rusqlite::Connection,
    stmt: &ParsedStatement,
    params: &NamedParams,
    aggregate: &mut CommitAggregate,
) -> Result<(), EngineError> {
    let mut prepared = prepare_bound(conn, stmt, params)?;
    if stmt.is_select() {
        let mut rows = prepared.raw_query();
        while rows.next()?.is_some() {}
        return Ok(());
    }
    let changes = prepared.raw_execute()?;
    aggregate.updated_rows += changes as u64;
    if changes > 0
        && let Some(table) = INSERT_TABLE.captures(stmt.text()).map(|c| c[1].to_owned())
        && let Some(pk) = last_sequence(conn, &table)?
    {
        aggregate.last_inserted_pks.insert(table, pk);
    }
    Ok(())
}

/// Last AUTOINCREMENT value SQLite handed out for `table`.
fn last_sequence(conn: &rusqlite::Connection, table: &str) -> Result<Option<i64>, EngineError> {
    let has_sequence: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE name = 'sqlite_sequence'",
        [],
        |row| row.get(0),
    )?;
    if has_sequence == 0 {
        return Ok(None);
    }
    let mut stmt = conn.prepare("SELECT seq FROM sqlite_sequence WHERE name = ?1")?;
    let mut rows = stmt.query([table])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

fn engine_type_name(decl_type: Option<&str>) -> &'static str {
    let Some(decl) = decl_type.map(str::to_ascii_uppercase) else {
        return type_names::ANY;
    };
    if decl.contains("BOOL") {
        type_names::BOOLEAN
    } else if decl.contains("TIMESTAMP") || decl.contains("DATETIME") {
        type_names::TIMESTAMP
    } else if decl.contains("INT") {
        type_names::INTEGER
    } else if decl.contains("CHAR") || decl.contains("TEXT") || decl.contains("CLOB") {
        type_names::VARCHAR
    } else if decl.contains("BLOB") {
        type_names::BLOB
    } else {
        type_names::ANY
    }
}

fn to_engine(value: Value, type_name: &str) -> EngineValue {
    match (value, type_name) {
        (Value::Null, _) => EngineValue::Null,
        (Value::Integer(i), type_names::BOOLEAN) => EngineValue::Boolean(i != 0),
        (Value::Integer(i), type_names::TIMESTAMP) => EngineValue::Timestamp(i),
        (Value::Integer(i), _) => EngineValue::Integer(i),
        (Value::Text(s), _) => EngineValue::Varchar(s),
        (Value::Blob(b), type_names::BLOB) => EngineValue::Blob(b),
        (Value::Blob(b), _) => EngineValue::Any(b),
        (Value::Real(f), _) => EngineValue::Any(f.to_string().into_bytes()),
    }
}

fn run_query(
    conn: &rusqlite::Connection,
    database: &str,
    stmt: &ParsedStatement,
    params: &NamedParams,
) -> Result<SqliteRows, EngineError> {
    let mut prepared = prepare_bound(conn, stmt, params)?;
    let table = FROM_TABLE
        .captures(stmt.text())
        .map(|c| c[1].to_owned())
        .unwrap_or_default();

    let mut columns: Vec<ColumnDescriptor> = Vec::new();
    let mut selectors: HashMap<String, usize> = HashMap::new();
    for (idx, col) in prepared.columns().iter().enumerate() {
        let name = format!("({database}.{table}.{})", col.name());
        let seen = selectors.entry(name.clone()).or_insert(0);
        *seen += 1;
        let selector = if *seen == 1 {
            name.clone()
        } else {
            format!("{name}#{idx}")
        };
        columns.push(ColumnDescriptor {
            name,
            type_name: engine_type_name(col.decl_type()).to_owned(),
            selector,
        });
    }

    let mut rows = VecDeque::new();
    let mut cursor = prepared.raw_query();
    while let Some(row) = cursor.next()? {
        let mut values = HashMap::with_capacity(columns.len());
        for (idx, col) in columns.iter().enumerate() {
            let value: Value = row.get(idx)?;
            values.insert(col.selector.clone(), to_engine(value, &col.type_name));
        }
        rows.push_back(EngineRow { values });
    }
    Ok(SqliteRows { columns, rows })
}
