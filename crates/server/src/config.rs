use serde::Deserialize;
use vaultlog_core::{ComplianceConfig, ComplianceMode};

/// Top-level configuration for the `vaultlogd` server, loaded from a TOML file.
#[derive(Debug, Deserialize)]
pub struct VaultlogConfig {
    /// HTTP bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Audit store backend configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for VaultlogConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

/// HTTP server bind configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    8081
}

/// Configuration for the composed audit sink: backend selection, chain
/// anchoring, retention, pseudonymization keys, the async queue, and
/// optional integrity-export signing.
#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    /// Which backend to use: `"memory"` or `"postgres"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Connection URL for the postgres backend.
    pub url: Option<String>,
    /// Insert an anchor every `anchor_interval`-th sequence number. `0`
    /// disables anchoring.
    #[serde(default)]
    pub anchor_interval: u64,
    /// Keep at most this many rows. Omit or set `<= 0` to disable.
    pub max_rows: Option<i64>,
    /// Keep only rows newer than this many seconds. Omit to disable.
    pub max_age_seconds: Option<u64>,
    /// Hex-encoded pseudonymization secrets, active key first. Empty means
    /// identifiers are stored as the literal `[redacted]`.
    #[serde(default)]
    pub hash_secrets: Vec<String>,
    /// Bounded async queue capacity.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Number of async worker tasks.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Background retention sweep interval, in seconds (postgres only).
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Hex-encoded Ed25519 signing seed for integrity exports. Omit to
    /// leave exports unsigned.
    pub signing_key_seed_hex: Option<String>,
    /// Key id recorded alongside a signature. Required if
    /// `signing_key_seed_hex` is set.
    pub signing_key_id: Option<String>,
    /// Compliance preset pre-filling `sync_writes`/retention knobs.
    #[serde(default)]
    pub compliance: ComplianceServerConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            anchor_interval: 0,
            max_rows: None,
            max_age_seconds: None,
            hash_secrets: Vec::new(),
            queue_size: default_queue_size(),
            workers: default_workers(),
            cleanup_interval_seconds: default_cleanup_interval(),
            signing_key_seed_hex: None,
            signing_key_id: None,
            compliance: ComplianceServerConfig::default(),
        }
    }
}

/// TOML-facing wrapper around [`ComplianceConfig`]: `mode` is a plain string
/// so an unrecognized value falls back to [`ComplianceMode::None`] rather
/// than failing config parsing, and the two knobs the preset fills can each
/// be overridden individually.
///
/// Does not expose a `hash_chain` knob: unlike the decorator this is
/// modeled on, every row here is always chained, so there is nothing for
/// such a flag to toggle.
#[derive(Debug, Default, Deserialize)]
pub struct ComplianceServerConfig {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub sync_writes: Option<bool>,
    #[serde(default)]
    pub immutable_retention: Option<bool>,
}

impl ComplianceServerConfig {
    /// Resolve `mode` plus any overrides into a [`ComplianceConfig`].
    #[must_use]
    pub fn to_compliance_config(&self) -> ComplianceConfig {
        let mode = match self.mode.to_lowercase().as_str() {
            "soc2" => ComplianceMode::Soc2,
            "hipaa" => ComplianceMode::Hipaa,
            _ => ComplianceMode::None,
        };
        let mut config = ComplianceConfig::new(mode);
        if let Some(v) = self.sync_writes {
            config = config.with_sync_writes(v);
        }
        if let Some(v) = self.immutable_retention {
            config = config.with_immutable_retention(v);
        }
        config
    }
}

fn default_backend() -> String {
    "memory".to_owned()
}

fn default_queue_size() -> usize {
    1024
}

fn default_workers() -> usize {
    1
}

fn default_cleanup_interval() -> u64 {
    3600
}
