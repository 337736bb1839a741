use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kubeprobe::{api::AppState, config::Config, create_router, k8s::K8sClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Kubeprobe server");

    // Load configuration
    let config = Config::load()?;
    let catalog = config.probe_catalog()?;
    tracing::info!(
        probes = catalog.len(),
        mode = %config.probe_mode,
        "Configuration loaded"
    );

    let metrics = PrometheusBuilder::new().install_recorder()?;

    // Build application state
    let state = AppState::new(config.clone(), catalog).with_metrics(metrics);

    // Spawn K8s Connection Manager (Automatic Reconnection)
    let mgr_state = state.clone();
    tokio::spawn(async move {
        tracing::info!("K8s connection manager started");

        loop {
            let needs_connect = mgr_state.k8s.read().await.is_none();

            if needs_connect {
                match K8sClient::connect(mgr_state.config.kubeconfig.as_deref()).await {
                    Ok(k8s) => match k8s.health_check().await {
                        Ok(_) => {
                            tracing::info!("Connected to Kubernetes cluster");
                            mgr_state.set_k8s(k8s).await;
                        }
                        Err(e) => {
                            tracing::warn!("K8s client created but unhealthy: {}", e);
                        }
                    },
                    Err(e) => {
                        tracing::debug!("K8s connection attempt failed: {}", e);
                    }
                }
            } else {
                // Clone so the lock is not held during the network request
                let k8s_opt = mgr_state.k8s.read().await.clone();
                if let Some(k8s) = k8s_opt {
                    if let Err(e) = k8s.health_check().await {
                        tracing::error!("Lost K8s connection: {}. Reconnecting...", e);
                        let mut guard = mgr_state.k8s.write().await;
                        *guard = None;
                    }
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(10)).await;
        }
    });

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
