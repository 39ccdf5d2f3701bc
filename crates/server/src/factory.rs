use std::sync::Arc;
use std::time::Duration;

use vaultlog_core::composition::{AsyncAuditor, AsyncAuditorConfig, MetricsSink};
use vaultlog_core::{AuditMetrics, DurableStore, RetentionPolicy};
use vaultlog_memory::{MemoryDurableStore, MemoryStoreConfig};
use vaultlog_postgres::{spawn_cleanup_task, PostgresDurableStore, PostgresStoreConfig};

use crate::config::AuditConfig;
use crate::error::ServerError;

fn parse_hash_secrets(config: &AuditConfig) -> Result<Vec<Vec<u8>>, ServerError> {
    config
        .hash_secrets
        .iter()
        .map(|hex_secret| hex::decode(hex_secret).map_err(|e| ServerError::Config(format!("invalid hash_secrets entry: {e}"))))
        .collect()
}

fn retention(config: &AuditConfig, compliance: &vaultlog_core::ComplianceConfig) -> RetentionPolicy {
    if compliance.immutable_retention {
        return RetentionPolicy::none();
    }
    RetentionPolicy {
        max_rows: config.max_rows,
        max_age: config.max_age_seconds.map(Duration::from_secs),
    }
}

/// Build the composed audit sink from configuration, mirroring the
/// teacher's backend-selection factory.
///
/// Normally this is `Async(Metrics(DurableStore))`. When
/// `config.compliance` resolves to `sync_writes = true` (SOC 2 and HIPAA
/// presets, or an explicit override), the `AsyncAuditor` wrapper is skipped
/// entirely and the metered store is returned directly, so `event` durably
/// writes before the request returns.
pub async fn create_audit_store(
    config: &AuditConfig,
    metrics: Arc<AuditMetrics>,
) -> Result<Arc<dyn DurableStore>, ServerError> {
    let async_config = AsyncAuditorConfig {
        queue_size: config.queue_size,
        workers: config.workers,
    };
    let compliance = config.compliance.to_compliance_config();

    match config.backend.as_str() {
        "memory" => {
            let memory_config = MemoryStoreConfig {
                retention: retention(config, &compliance),
                anchor_interval: config.anchor_interval,
                hash_secrets: parse_hash_secrets(config)?,
            };
            let store = Arc::new(MemoryDurableStore::new(memory_config, metrics.clone()));
            let metered = Arc::new(MetricsSink::new(store, metrics.clone()));
            if compliance.sync_writes {
                return Ok(metered);
            }
            Ok(AsyncAuditor::new(metered, async_config, metrics))
        }
        "postgres" => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| ServerError::Config("audit postgres backend requires [audit] url".into()))?;

            let pg_config = PostgresStoreConfig::new(url)
                .with_retention(retention(config, &compliance))
                .with_anchor_interval(config.anchor_interval)
                .with_hash_secrets(parse_hash_secrets(config)?)
                .with_cleanup_interval(Some(Duration::from_secs(config.cleanup_interval_seconds)));

            let store = Arc::new(
                PostgresDurableStore::new(pg_config, metrics.clone())
                    .await
                    .map_err(|e| ServerError::Config(format!("audit postgres: {e}")))?,
            );
            spawn_cleanup_task(store.clone(), Duration::from_secs(config.cleanup_interval_seconds));

            let metered = Arc::new(MetricsSink::new(store, metrics.clone()));
            if compliance.sync_writes {
                return Ok(metered);
            }
            Ok(AsyncAuditor::new(metered, async_config, metrics))
        }
        other => Err(ServerError::Config(format!("unknown audit backend: {other}"))),
    }
}
