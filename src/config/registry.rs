use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::options::{EmbeddedConfig, TlsOptions};
use crate::error::LedgerSqlError;

#[derive(Debug, Default)]
struct Entries {
    embedded: HashMap<String, EmbeddedConfig>,
    tls: HashMap<String, TlsOptions>,
    sealed: bool,
}

/// Named embedded configurations and per-host TLS options.
///
/// Populate during setup, then [`seal`](ConfigRegistry::seal) it; lookups keep
/// working after sealing but registration fails with `RegistrySealed`. Share
/// it between connectors behind an `Arc`.
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    entries: RwLock<Entries>,
}

impl ConfigRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// # Errors
    /// `ConfigAlreadyRegistered` if `name` is taken, `RegistrySealed` after sealing.
    pub fn register_embedded(
        &self,
        name: impl Into<String>,
        config: EmbeddedConfig,
    ) -> Result<(), LedgerSqlError> {
        let name = name.into();
        let mut entries = self.write();
        if entries.sealed {
            return Err(LedgerSqlError::RegistrySealed);
        }
        if entries.embedded.contains_key(&name) {
            return Err(LedgerSqlError::ConfigAlreadyRegistered { name });
        }
        debug!(name = %name, "registered embedded configuration");
        entries.embedded.insert(name, config);
        Ok(())
    }

    /// Register TLS options used for every remote connection to `host`.
    ///
    /// # Errors
    /// `ConfigAlreadyRegistered` if `host` is taken, `RegistrySealed` after sealing.
    pub fn register_tls(
        &self,
        host: impl Into<String>,
        options: TlsOptions,
    ) -> Result<(), LedgerSqlError> {
        let host = host.into();
        let mut entries = self.write();
        if entries.sealed {
            return Err(LedgerSqlError::RegistrySealed);
        }
        if entries.tls.contains_key(&host) {
            return Err(LedgerSqlError::ConfigAlreadyRegistered { name: host });
        }
        debug!(host = %host, "registered tls options");
        entries.tls.insert(host, options);
        Ok(())
    }

    #[must_use]
    pub fn embedded(&self, name: &str) -> Option<EmbeddedConfig> {
        self.read().embedded.get(name).cloned()
    }

    /// # Errors
    /// `ConfigNotRegistered` when no embedded configuration has this name.
    pub fn require_embedded(&self, name: &str) -> Result<EmbeddedConfig, LedgerSqlError> {
        self.embedded(name)
            .ok_or_else(|| LedgerSqlError::ConfigNotRegistered {
                name: name.to_owned(),
            })
    }

    #[must_use]
    pub fn tls(&self, host: &str) -> Option<TlsOptions> {
        self.read().tls.get(host).cloned()
    }

    pub fn seal(&self) {
        self.write().sealed = true;
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.read().sealed
    }
}
