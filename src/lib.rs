//! Kubeprobe Library
//!
//! Tests pod-level connectivity inside a Kubernetes cluster by running
//! diagnostic commands in the source pod. The probing engine lives in
//! [`probe`]; [`api`] and the `kubeprobe` binary are thin surfaces over it.

pub mod api;
pub mod config;
pub mod error;
pub mod k8s;
pub mod probe;

use axum::http::{header, HeaderName, Method};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;
use crate::api::AppState;

/// Create the application router with the given state
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/api/hello", get(api::health::hello))
        .route("/api/cluster/status", get(api::health::cluster_status))
        // Resources
        .route("/api/pods", get(api::resources::list_pods))
        .route("/api/services", get(api::resources::list_services))
        // Connectivity
        .route("/api/test-connection", post(api::connection::test_connection))
        .route("/api/v1/connectivity", post(api::connection::run_connectivity))
        .route("/api/v1/probes", get(api::connection::list_probes))
        // Exec
        .route("/api/pod-exec", post(api::exec::pod_exec))
        // Metrics (Prometheus)
        .route("/metrics", get(api::metrics::metrics_handler))
        // OpenAPI / Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// CORS layer; `*` opens every origin
fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let origin = if allowed_origins.trim() == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<_> = allowed_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
        ])
}
