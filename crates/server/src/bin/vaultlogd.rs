use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use vaultlog_core::AuditMetrics;
use vaultlog_crypto::Signer;
use vaultlog_server::{factory, AppState, ServerError, VaultlogConfig};

/// Standalone HTTP server exposing the audit query surface.
#[derive(Parser, Debug)]
#[command(name = "vaultlogd", about = "Tamper-evident audit log server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "vaultlog.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the audit backend (`memory` or `postgres`).
    #[arg(long)]
    backend: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config: VaultlogConfig = if Path::new(&cli.config).exists() {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents).map_err(ServerError::from)?
    } else {
        info!(path = %cli.config, "config file not found, using defaults");
        VaultlogConfig::default()
    };

    if let Some(backend) = cli.backend {
        config.audit.backend = backend;
    }

    let metrics = Arc::new(AuditMetrics::new());
    let audit = factory::create_audit_store(&config.audit, metrics.clone()).await?;

    let signer = match &config.audit.signing_key_seed_hex {
        Some(hex_seed) => {
            let seed = hex::decode(hex_seed).map_err(|e| ServerError::Config(format!("invalid signing_key_seed_hex: {e}")))?;
            let kid = config
                .audit
                .signing_key_id
                .clone()
                .ok_or_else(|| ServerError::Config("signing_key_seed_hex requires signing_key_id".into()))?;
            Some(Arc::new(
                Signer::from_seed(&seed, kid).map_err(|e| ServerError::Config(format!("signing key: {e}")))?,
            ))
        }
        None => None,
    };

    let state = AppState {
        audit: Some(audit.clone()),
        signer,
        metrics,
    };
    let app = vaultlog_server::api::router(state);

    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "vaultlogd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    audit.close().await;
    info!("vaultlogd shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
