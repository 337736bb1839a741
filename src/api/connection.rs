//! Connectivity test endpoints
//!
//! `POST /api/test-connection` is the pod-to-service form used by the dashboard and
//! answers with a bare boolean. `POST /api/v1/connectivity` accepts any target
//! kind and returns the full attempt log.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::probe::{ConnectivityResult, Endpoint, ProbeCatalog, ProbeMode};

/// Pod-to-service connectivity request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectionRequest {
    pub from: String,
    #[serde(default)]
    pub from_namespace: String,
    pub to: String,
    #[serde(default)]
    pub to_namespace: String,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Pod running the probes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkloadRef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// What the probes should try to reach
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetRef {
    Pod {
        name: String,
        #[serde(default)]
        namespace: String,
    },
    Service {
        name: String,
        #[serde(default)]
        namespace: String,
    },
    External {
        host: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectivityRequest {
    pub source: WorkloadRef,
    pub target: TargetRef,
    #[serde(default)]
    pub port: Option<u16>,
    /// Overrides the configured probe mode
    #[serde(default)]
    pub mode: Option<ProbeMode>,
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::bad_request(&e.body_text()))
}

/// Test whether a pod can reach a service
#[utoipa::path(
    post,
    path = "/api/test-connection",
    tag = "connectivity",
    request_body = ConnectionRequest,
    responses(
        (status = 200, description = "Whether the service is reachable", body = bool),
        (status = 400, description = "Malformed request"),
        (status = 404, description = "Pod or service not found"),
        (status = 503, description = "Cluster not connected"),
    )
)]
pub async fn test_connection(
    State(state): State<AppState>,
    payload: Result<Json<ConnectionRequest>, JsonRejection>,
) -> AppResult<Json<bool>> {
    let req = parse_body(payload)?;
    let k8s = state.k8s().await?;

    let source = k8s
        .pod_endpoint(&req.from, state.namespace_or_default(&req.from_namespace))
        .await?;
    let target = k8s
        .service_endpoint(&req.to, state.namespace_or_default(&req.to_namespace))
        .await?;

    let result = state
        .engine(k8s, None)
        .test_connectivity(&source, &target, req.port)
        .await?;

    info!(from = %req.from, to = %req.to, reachable = result.reachable, "Connection tested");
    Ok(Json(result.reachable))
}

/// Run a connectivity test and return every probe attempt
#[utoipa::path(
    post,
    path = "/api/v1/connectivity",
    tag = "connectivity",
    request_body = ConnectivityRequest,
    responses(
        (status = 200, description = "Verdict with diagnostics", body = ConnectivityResult),
        (status = 400, description = "Malformed request or unresolvable target"),
        (status = 404, description = "Pod or service not found"),
        (status = 503, description = "Cluster not connected"),
    )
)]
pub async fn run_connectivity(
    State(state): State<AppState>,
    payload: Result<Json<ConnectivityRequest>, JsonRejection>,
) -> AppResult<Json<ConnectivityResult>> {
    let req = parse_body(payload)?;
    let k8s = state.k8s().await?;

    let source = k8s
        .pod_endpoint(&req.source.name, state.namespace_or_default(&req.source.namespace))
        .await?;
    let target = match &req.target {
        TargetRef::Pod { name, namespace } => {
            k8s.pod_endpoint(name, state.namespace_or_default(namespace))
                .await?
        }
        TargetRef::Service { name, namespace } => {
            k8s.service_endpoint(name, state.namespace_or_default(namespace))
                .await?
        }
        TargetRef::External { host } => Endpoint::external(host.clone()),
    };

    let result = state
        .engine(k8s, req.mode)
        .test_connectivity(&source, &target, req.port)
        .await?;

    Ok(Json(result))
}

/// Active probe catalog, in fallback order
#[utoipa::path(
    get,
    path = "/api/v1/probes",
    tag = "connectivity",
    responses((status = 200, description = "Probe catalog", body = ProbeCatalog))
)]
pub async fn list_probes(State(state): State<AppState>) -> Json<ProbeCatalog> {
    Json(state.catalog.as_ref().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_request_field_names() {
        let req: ConnectionRequest = serde_json::from_str(
            r#"{"From":"web-1","FromNamespace":"app","To":"db","ToNamespace":"data"}"#,
        )
        .unwrap();
        assert_eq!(req.from, "web-1");
        assert_eq!(req.to_namespace, "data");
        assert_eq!(req.port, None);
    }

    #[test]
    fn test_connectivity_request_target_kinds() {
        let req: ConnectivityRequest = serde_json::from_str(
            r#"{"source":{"name":"web-1","namespace":"app"},
                "target":{"kind":"external","host":"https://example.com"},
                "mode":"legacy"}"#,
        )
        .unwrap();
        assert!(matches!(req.target, TargetRef::External { .. }));
        assert_eq!(req.mode, Some(ProbeMode::Legacy));

        let req: ConnectivityRequest = serde_json::from_str(
            r#"{"source":{"name":"web-1"},"target":{"kind":"pod","name":"api-0"},"port":8080}"#,
        )
        .unwrap();
        assert_eq!(req.source.namespace, "");
        assert_eq!(req.port, Some(8080));
    }
}
