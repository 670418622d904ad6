//! Opening connections from a DSN.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigRegistry, DsnConfig, EmbeddedConfig, RemoteOptions, parse_dsn};
use crate::connection::Connection;
use crate::context::CallContext;
use crate::engine::{EmbeddedEngine, EmbeddedOpener, RemoteDialer};
use crate::error::LedgerSqlError;
use crate::types::BackendKind;

/// Entry point: holds the engine factories and the configuration registry,
/// and turns DSNs into [`Connector`]s.
#[derive(Clone, Default)]
pub struct LedgerDriver {
    registry: Arc<ConfigRegistry>,
    dialer: Option<Arc<dyn RemoteDialer>>,
    opener: Option<Arc<dyn EmbeddedOpener>>,
}

impl std::fmt::Debug for LedgerDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerDriver")
            .field("registry", &self.registry)
            .field("remote", &self.dialer.is_some())
            .field("embedded", &self.opener.is_some())
            .finish()
    }
}

impl LedgerDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ConfigRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_dialer(mut self, dialer: Arc<dyn RemoteDialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    #[must_use]
    pub fn with_opener(mut self, opener: Arc<dyn EmbeddedOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    /// Parse `dsn` once; the connector can then open any number of connections.
    ///
    /// # Errors
    /// `ConfigError` for an invalid DSN.
    pub fn open_connector(&self, dsn: &str) -> Result<Connector, LedgerSqlError> {
        Ok(Connector::new(parse_dsn(dsn)?, self.clone()))
    }

    /// Parse `dsn` and open one connection.
    ///
    /// # Errors
    /// DSN, configuration and engine errors.
    pub async fn open(&self, ctx: &CallContext, dsn: &str) -> Result<Connection, LedgerSqlError> {
        self.open_connector(dsn)?.connect(ctx).await
    }
}

/// Opens connections for one parsed DSN.
#[derive(Debug, Clone)]
pub struct Connector {
    config: DsnConfig,
    driver: LedgerDriver,
}

impl Connector {
    #[must_use]
    pub fn new(config: DsnConfig, driver: LedgerDriver) -> Self {
        Self { config, driver }
    }

    #[must_use]
    pub fn config(&self) -> &DsnConfig {
        &self.config
    }

    #[must_use]
    pub fn driver(&self) -> &LedgerDriver {
        &self.driver
    }

    /// Store locations for an embedded DSN.
    ///
    /// A DSN host or directory that names a registered configuration uses it;
    /// otherwise the store lives in `<directory>/catalog` and `<directory>/data`.
    #[must_use]
    pub fn embedded_config(&self) -> EmbeddedConfig {
        let registry = &self.driver.registry;
        if let Some(conf) = registry.embedded(&self.config.host) {
            return conf;
        }
        let directory = self.config.directory.clone().unwrap_or_default();
        if let Some(conf) = directory.to_str().and_then(|dir| registry.embedded(dir)) {
            return conf;
        }
        EmbeddedConfig::in_directory(directory)
    }

    /// Session options for a remote DSN, with TLS options registered for its host.
    #[must_use]
    pub fn remote_options(&self) -> RemoteOptions {
        let mut opts = RemoteOptions::new(&self.config.host, self.config.port, &self.config.database);
        if let Some(user) = &self.config.user {
            opts = opts.with_credentials(user, self.config.password.clone());
        }
        if let Some(tls) = self.driver.registry.tls(&self.config.host) {
            opts = opts.with_tls(tls);
        }
        opts
    }

    /// Open a new connection.
    ///
    /// # Errors
    /// `ConfigError` when no factory is installed for the DSN's backend, or
    /// the engine's error.
    #[instrument(skip_all, fields(backend = ?self.config.backend, database = %self.config.database))]
    pub async fn connect(&self, ctx: &CallContext) -> Result<Connection, LedgerSqlError> {
        let conn = match self.config.backend {
            BackendKind::Embedded => self.open_embedded(ctx).await?,
            BackendKind::Remote => ctx.run(self.open_remote()).await?,
        };
        info!("connection opened");
        Ok(conn)
    }

    /// Open the engine, then create and select the database. The engine is
    /// closed again if anything after opening fails or the context ends.
    async fn open_embedded(&self, ctx: &CallContext) -> Result<Connection, LedgerSqlError> {
        let opener = self.driver.opener.as_ref().ok_or_else(|| {
            LedgerSqlError::ConfigError("no embedded engine opener is installed".into())
        })?;
        let config = self.embedded_config();
        let mut engine = ctx
            .run(async { opener.open(&config).await.map_err(LedgerSqlError::Engine) })
            .await?;
        let database = &self.config.database;
        if let Err(err) = ctx.run(select_database(engine.as_mut(), database)).await {
            if let Err(close_err) = engine.close().await {
                warn!(error = %close_err, "closing engine after failed open failed");
            }
            return Err(err);
        }
        Ok(Connection::from_embedded(engine))
    }

    async fn open_remote(&self) -> Result<Connection, LedgerSqlError> {
        let dialer = self.driver.dialer.as_ref().ok_or_else(|| {
            LedgerSqlError::ConfigError("no remote session dialer is installed".into())
        })?;
        let opts = self.remote_options();
        debug!(host = %opts.host, port = opts.port, tls = opts.tls.is_some(), "dialing");
        let session = dialer.dial(&opts).await.map_err(LedgerSqlError::Engine)?;
        Ok(Connection::from_remote(session))
    }
}

async fn select_database(
    engine: &mut dyn EmbeddedEngine,
    database: &str,
) -> Result<(), LedgerSqlError> {
    if !engine
        .exist_database(database)
        .await
        .map_err(LedgerSqlError::Engine)?
    {
        debug!(database = %database, "creating database");
        engine
            .create_database(database)
            .await
            .map_err(LedgerSqlError::Engine)?;
    }
    engine
        .use_database(database)
        .await
        .map_err(LedgerSqlError::Engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsOptions;

    #[test]
    fn embedded_config_defaults_to_dsn_directory() {
        let connector = LedgerDriver::new()
            .open_connector("ledgersqle:///srv/ledger/orders")
            .unwrap();
        assert_eq!(
            connector.embedded_config(),
            EmbeddedConfig::in_directory("/srv/ledger")
        );
    }

    #[test]
    fn registered_embedded_name_wins() {
        let registry = Arc::new(ConfigRegistry::new());
        let conf = EmbeddedConfig::in_directory("/a").with_data_path("/b/data");
        registry.register_embedded("store", conf.clone()).unwrap();
        let driver = LedgerDriver::new().with_registry(registry);

        let connector = driver.open_connector("ledgersqle://store/orders").unwrap();
        assert_eq!(connector.embedded_config(), conf);
        assert_eq!(connector.config().database, "orders");
    }

    #[test]
    fn remote_options_pick_up_credentials_and_tls() {
        let registry = Arc::new(ConfigRegistry::new());
        let tls = TlsOptions::new("ledger", "c.pem", "k.pem", "ca.pem");
        registry.register_tls("ledger.internal", tls.clone()).unwrap();
        let driver = LedgerDriver::new().with_registry(registry);

        let opts = driver
            .open_connector("ledgersql://svc:pw@ledger.internal:4000/orders")
            .unwrap()
            .remote_options();
        assert_eq!(opts.host, "ledger.internal");
        assert_eq!(opts.port, 4000);
        assert_eq!(opts.database, "orders");
        assert_eq!(opts.username.as_deref(), Some("svc"));
        assert_eq!(opts.password.as_deref(), Some("pw"));
        assert_eq!(opts.tls, Some(tls));
    }

    #[tokio::test]
    async fn missing_factory_is_a_config_error() {
        let err = LedgerDriver::new()
            .open(&CallContext::background(), "ledgersql://localhost/db")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerSqlError::ConfigError(_)));
    }
}
