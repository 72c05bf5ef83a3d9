//! Digest gateway binary

use digest_core::{DigestConfig, Gate, ReloadCoordinator};
use digest_server::{build_router, AppState, BackendClient, BackendProxy};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Optional path of the TOML configuration file
const CONFIG_ENV: &str = "DIGEST_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let enable_otel = std::env::var("OTEL_ENABLED")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if enable_otel {
        digest_server::tracing::init_tracing_stack("digest-gateway")?;
        info!("OpenTelemetry tracing enabled");
    } else {
        use tracing_subscriber::{EnvFilter, FmtSubscriber};
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    EnvFilter::new(digest_server::tracing::DEFAULT_LOG_FILTER)
                }),
            )
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
        info!("Console logging enabled (set OTEL_ENABLED=true for OpenTelemetry)");
    }

    info!("Starting digest gateway v{}", env!("CARGO_PKG_VERSION"));

    digest_server::metrics::init_prometheus()?;
    digest_server::metrics::init_metrics();

    let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
    let config = DigestConfig::load(config_path.as_deref())?;

    let gate = Arc::new(Gate::new(&config.gate)?);
    if gate.is_fail_open() {
        warn!("Token allow-list is empty: gated routes are open to everyone");
    }

    let http = reqwest::Client::new();
    let proxy = BackendProxy::with_client(config.backend.base_url(), http.clone())?;
    let backend = BackendClient::from_config(&config.backend)?
        .with_http_client(http)
        .with_service_tokens(config.gate.allow_list_source());
    info!("Backend at {}", backend.base_url());

    if let Some(path) = &config_path {
        let mut coordinator = ReloadCoordinator::new(gate.clone(), path)?;
        let mut events = coordinator.subscribe();
        tokio::spawn(async move {
            if let Err(e) = coordinator.run().await {
                warn!("Config reload stopped: {}", e);
            }
        });
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                digest_server::metrics::record_reload(&event.result);
            }
        });
        info!("Watching {:?} for configuration changes", path);
    }

    let state = AppState::new(gate, proxy, backend);
    let app = build_router(state);

    let addr: SocketAddr = config.server.bind_address.parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, shutting down gracefully...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    if enable_otel {
        info!("Flushing OpenTelemetry traces...");
        digest_server::tracing::shutdown_telemetry();
    }

    info!("Server shutdown complete");
    Ok(())
}
