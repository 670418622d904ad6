//! Convenient imports for common functionality.

pub use crate::config::{
    ConfigRegistry, DsnConfig, EmbeddedConfig, RemoteOptions, TlsOptions, parse_dsn,
};
pub use crate::connection::{Connection, LedgerConnExt, Statement};
pub use crate::connector::{Connector, LedgerDriver};
pub use crate::context::CallContext;
pub use crate::error::LedgerSqlError;
pub use crate::params::{NamedParams, Param};
pub use crate::pool::{ConnectionManager, LedgerPool, build_pool};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::rows::{RowStatus, Rows};
pub use crate::transaction::reconcile::{ExecResult, UNKNOWN_LAST_INSERT_ID};
pub use crate::transaction::{ExecOutcome, IsolationLevel, TxOptions};
pub use crate::types::{BackendKind, RowValues, ScanType};
