//! Test support: an SQLite-backed stand-in for the ledger engine.
//!
//! [`SqliteLedger`] implements both engine seams, so the same connection code
//! paths run against it as against a real server or embedded engine. Fault
//! hooks on the ledger let tests break liveness, commit and rollback.

pub mod sqlite_engine;

pub use sqlite_engine::{SqliteLedger, SqliteLedgerFactory, SqliteRows, SqliteTx};
