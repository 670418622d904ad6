//! Async driver adapter for a ledger SQL engine.
//!
//! A [`Connection`] talks to either a remote ledger server (with native
//! multi-statement transactions) or an embedded engine (which only accepts one
//! atomic batch per commit, so transactions are emulated by queueing).
//!
//! ```rust,no_run
//! use ledger_sql_driver::prelude::*;
//!
//! # async fn demo(driver: LedgerDriver) -> Result<(), LedgerSqlError> {
//! let ctx = CallContext::background();
//! let mut conn = driver.open(&ctx, "ledgersqle:///var/lib/ledger/orders").await?;
//!
//! conn.begin_tx(&ctx, TxOptions::default()).await?;
//! conn.exec(
//!     &ctx,
//!     "INSERT INTO customers (name) VALUES (?)",
//!     &Param::positional_list(&[RowValues::Text("Maria".into())]),
//! )
//! .await?;
//! let res = conn.commit(&ctx).await?;
//! println!("{} rows, last id {:?}", res.rows_affected(), res.known_last_insert_id());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod connector;
pub mod context;
pub mod engine;
pub mod error;
pub mod params;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod rows;
pub mod transaction;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use connection::{Connection, LedgerConnExt, Statement};
pub use connector::{Connector, LedgerDriver};
pub use context::CallContext;
pub use error::LedgerSqlError;
pub use rows::{RowStatus, Rows};
pub use transaction::reconcile::{ExecResult, UNKNOWN_LAST_INSERT_ID};
pub use transaction::{ExecOutcome, IsolationLevel, TxOptions};
pub use types::{BackendKind, RowValues, ScanType};

