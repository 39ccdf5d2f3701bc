use thiserror::Error;

/// Errors that can occur while starting or configuring the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener, reading the config file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML config parsing failed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A durable store backend error surfaced during startup.
    #[error("audit store error: {0}")]
    Audit(#[from] vaultlog_core::AuditError),
}
