pub mod connection;
pub mod exec;
pub mod health;
pub mod metrics;
pub mod openapi;
pub mod resources;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::k8s::K8sClient;
use crate::probe::{ConnectivityEngine, ProbeCatalog, ProbeMode};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub k8s: Arc<RwLock<Option<K8sClient>>>,
    pub catalog: Arc<ProbeCatalog>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, catalog: Arc<ProbeCatalog>) -> Self {
        Self {
            config,
            k8s: Arc::new(RwLock::new(None)),
            catalog,
            metrics: None,
        }
    }

    pub async fn set_k8s(&self, k8s: K8sClient) {
        let mut guard = self.k8s.write().await;
        *guard = Some(k8s);
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Current cluster client, or 503 while disconnected
    pub async fn k8s(&self) -> AppResult<K8sClient> {
        self.k8s
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::unavailable("Kubernetes cluster not available"))
    }

    /// Engine over the shared catalog, executing through `k8s`
    pub fn engine(&self, k8s: K8sClient, mode: Option<ProbeMode>) -> ConnectivityEngine {
        ConnectivityEngine::new(
            self.catalog.clone(),
            mode.unwrap_or(self.config.probe_mode),
            Arc::new(k8s),
        )
    }

    /// Namespace to use when a request leaves it empty
    pub fn namespace_or_default<'a>(&'a self, namespace: &'a str) -> &'a str {
        if namespace.trim().is_empty() {
            &self.config.default_namespace
        } else {
            namespace
        }
    }
}
