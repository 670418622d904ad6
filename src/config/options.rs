use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::dsn::{DEFAULT_DATABASE, DEFAULT_HOST, DEFAULT_PORT};

/// Store locations for an embedded engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedConfig {
    pub catalog_path: PathBuf,
    pub data_path: PathBuf,
}

impl EmbeddedConfig {
    /// `<directory>/catalog` and `<directory>/data`.
    #[must_use]
    pub fn in_directory(directory: impl AsRef<Path>) -> Self {
        let directory = directory.as_ref();
        Self {
            catalog_path: directory.join("catalog"),
            data_path: directory.join("data"),
        }
    }

    #[must_use]
    pub fn with_catalog_path(mut self, catalog_path: impl Into<PathBuf>) -> Self {
        self.catalog_path = catalog_path.into();
        self
    }

    #[must_use]
    pub fn with_data_path(mut self, data_path: impl Into<PathBuf>) -> Self {
        self.data_path = data_path.into();
        self
    }
}

/// Mutual-TLS material for a remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsOptions {
    pub server_name: String,
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub client_cas: PathBuf,
}

impl TlsOptions {
    #[must_use]
    pub fn new(
        server_name: impl Into<String>,
        certificate: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
        client_cas: impl Into<PathBuf>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            certificate: certificate.into(),
            private_key: private_key.into(),
            client_cas: client_cas.into(),
        }
    }
}

/// Everything a [`RemoteDialer`](crate::engine::RemoteDialer) needs to open a session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOptions {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: Option<TlsOptions>,
}

// Keeps the password out of logs.
impl std::fmt::Debug for RemoteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("tls", &self.tls)
            .finish()
    }
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_owned(),
            username: None,
            password: None,
            tls: None,
        }
    }
}

impl RemoteOptions {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            ..Self::default()
        }
    }

    /// Credentials are only sent when a user name is set.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    #[must_use]
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }

    #[must_use]
    pub fn builder() -> RemoteOptionsBuilder {
        RemoteOptionsBuilder::default()
    }
}

/// Fluent builder for [`RemoteOptions`].
#[derive(Debug, Clone, Default)]
pub struct RemoteOptionsBuilder {
    opts: RemoteOptions,
}

impl RemoteOptionsBuilder {
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.opts.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.opts.database = database.into();
        self
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.opts = self.opts.with_credentials(username, password);
        self
    }

    #[must_use]
    pub fn tls(mut self, tls: TlsOptions) -> Self {
        self.opts.tls = Some(tls);
        self
    }

    #[must_use]
    pub fn finish(self) -> RemoteOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_defaults_to_subdirectories() {
        let conf = EmbeddedConfig::in_directory("/srv/ledger");
        assert_eq!(conf.catalog_path, PathBuf::from("/srv/ledger/catalog"));
        assert_eq!(conf.data_path, PathBuf::from("/srv/ledger/data"));

        let conf = conf.with_data_path("/mnt/fast/data");
        assert_eq!(conf.data_path, PathBuf::from("/mnt/fast/data"));
    }

    #[test]
    fn builder_fills_remote_options() {
        let opts = RemoteOptions::builder()
            .host("ledger.internal")
            .port(4000)
            .database("orders")
            .credentials("svc", Some("secret".into()))
            .finish();
        assert_eq!(opts.host, "ledger.internal");
        assert_eq!(opts.port, 4000);
        assert_eq!(opts.database, "orders");
        assert_eq!(opts.username.as_deref(), Some("svc"));
        assert!(opts.tls.is_none());
    }

    #[test]
    fn debug_output_masks_the_password() {
        let opts = RemoteOptions::default().with_credentials("svc", Some("secret".into()));
        let printed = format!("{opts:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn options_serialize_as_plain_data() {
        let opts = RemoteOptions::new("h", 1, "d");
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["host"], "h");
        assert_eq!(json["tls"], serde_json::Value::Null);
    }
}
