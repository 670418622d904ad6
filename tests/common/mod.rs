#![allow(dead_code)]

use std::sync::Arc;

use ledger_sql_driver::prelude::*;
use ledger_sql_driver::test_utils::{SqliteLedger, SqliteLedgerFactory};

pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub const SCHEMA: &str = "
    CREATE TABLE customers (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR NOT NULL);
    CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT, customer_id INTEGER, total INTEGER);
    CREATE TABLE pairs (a INTEGER, b INTEGER);
";

pub fn ledger() -> Result<SqliteLedger, Box<dyn std::error::Error + Send + Sync>> {
    let ledger = SqliteLedger::in_memory()?;
    ledger.execute_raw(SCHEMA)?;
    Ok(ledger)
}

pub fn driver(ledger: &SqliteLedger) -> LedgerDriver {
    let factory = Arc::new(SqliteLedgerFactory::shared(ledger.clone()));
    LedgerDriver::new()
        .with_opener(factory.clone())
        .with_dialer(factory)
}

pub async fn embedded(ledger: &SqliteLedger) -> Result<Connection, LedgerSqlError> {
    driver(ledger)
        .open(&CallContext::background(), "ledgersqle:///ignored/testdb")
        .await
}

pub async fn remote(ledger: &SqliteLedger) -> Result<Connection, LedgerSqlError> {
    driver(ledger)
        .open(&CallContext::background(), "ledgersql://localhost/testdb")
        .await
}

pub fn text(s: &str) -> RowValues {
    RowValues::Text(s.to_owned())
}
