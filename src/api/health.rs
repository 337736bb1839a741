//! Liveness and readiness of the prober

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::probe::ProbeMode;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Whether connectivity tests can run right now, and how
#[derive(Serialize, ToSchema)]
pub struct ProberStatusResponse {
    /// A cluster client is connected; tests answer 503 otherwise
    pub connected: bool,
    /// Mode used when a request does not pick one
    pub probe_mode: ProbeMode,
    /// Tools of the active catalog, in fallback order
    pub probes: Vec<String>,
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    tag = "cluster",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn hello() -> &'static str {
    "Hello World!"
}

/// Cluster connection and probing configuration
#[utoipa::path(
    get,
    path = "/api/cluster/status",
    tag = "cluster",
    responses((status = 200, description = "Prober status", body = ProberStatusResponse))
)]
pub async fn cluster_status(State(state): State<AppState>) -> Json<ProberStatusResponse> {
    Json(ProberStatusResponse {
        connected: state.k8s.read().await.is_some(),
        probe_mode: state.config.probe_mode,
        probes: state.catalog.iter().map(|p| p.tool.clone()).collect(),
    })
}
