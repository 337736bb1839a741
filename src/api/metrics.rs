use axum::{extract::State, response::IntoResponse};

use crate::api::AppState;

const INFO_METRIC: &str = concat!(
    "# HELP kubeprobe_info Kubeprobe build info\n",
    "# TYPE kubeprobe_info gauge\n",
    "kubeprobe_info{version=\"",
    env!("CARGO_PKG_VERSION"),
    "\"} 1\n"
);

/// Prometheus metrics endpoint
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "cluster",
    responses((status = 200, description = "Prometheus text exposition", body = String))
)]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = INFO_METRIC.to_string();
    if let Some(handle) = &state.metrics {
        body.push_str(&handle.render());
    }

    ([("content-type", "text/plain; charset=utf-8")], body)
}
