//! Connection configuration: DSN parsing, backend options and the
//! named-configuration registry.

mod dsn;
mod options;
mod registry;

pub use dsn::{DEFAULT_DATABASE, DEFAULT_HOST, DEFAULT_PORT, DsnConfig, parse_dsn};
pub use options::{EmbeddedConfig, RemoteOptions, RemoteOptionsBuilder, TlsOptions};
pub use registry::ConfigRegistry;
