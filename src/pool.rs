//! deadpool integration.

use deadpool::managed::{Manager, Metrics, Pool, RecycleError, RecycleResult};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::connector::Connector;
use crate::context::CallContext;
use crate::error::LedgerSqlError;

/// Creates connections from a [`Connector`] and vets them before reuse.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    connector: Connector,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(connector: Connector) -> Self {
        Self { connector }
    }

    #[must_use]
    pub fn connector(&self) -> &Connector {
        &self.connector
    }
}

impl Manager for ConnectionManager {
    type Type = Connection;
    type Error = LedgerSqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        self.connector.connect(&CallContext::background()).await
    }

    async fn recycle(&self, conn: &mut Self::Type, _metrics: &Metrics) -> RecycleResult<Self::Error> {
        if conn.is_closed() {
            return Err(RecycleError::Message("connection was closed".into()));
        }
        if conn.abandon_transaction().await {
            warn!("pooled connection returned with an active transaction; rolled back");
        }
        match conn.reset_session(&CallContext::background()).await {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(error = %err, "discarding pooled connection");
                Err(RecycleError::Backend(err))
            }
        }
    }
}

pub type LedgerPool = Pool<ConnectionManager>;

/// Build a pool of at most `max_size` connections.
///
/// # Errors
/// Returns `ConnectionError` if the pool cannot be built.
pub fn build_pool(connector: Connector, max_size: usize) -> Result<LedgerPool, LedgerSqlError> {
    Pool::builder(ConnectionManager::new(connector))
        .max_size(max_size)
        .build()
        .map_err(|e| LedgerSqlError::ConnectionError(format!("Failed to create pool: {e}")))
}
