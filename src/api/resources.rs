//! Pod and service listings used to pick connectivity endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::AppState;
use crate::error::AppResult;
use crate::k8s::{PodSummary, ServiceSummary};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct NamespaceQuery {
    /// Restrict the listing to one namespace
    pub namespace: Option<String>,
}

/// List pods
#[utoipa::path(
    get,
    path = "/api/pods",
    tag = "resources",
    params(NamespaceQuery),
    responses(
        (status = 200, description = "Pods in the cluster", body = Vec<PodSummary>),
        (status = 503, description = "Cluster not connected"),
    )
)]
pub async fn list_pods(
    State(state): State<AppState>,
    Query(query): Query<NamespaceQuery>,
) -> AppResult<Json<Vec<PodSummary>>> {
    let k8s = state.k8s().await?;
    let pods = k8s.list_pods(query.namespace.as_deref()).await?;
    Ok(Json(pods.iter().map(PodSummary::from).collect()))
}

/// List services
#[utoipa::path(
    get,
    path = "/api/services",
    tag = "resources",
    params(NamespaceQuery),
    responses(
        (status = 200, description = "Services in the cluster", body = Vec<ServiceSummary>),
        (status = 503, description = "Cluster not connected"),
    )
)]
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<NamespaceQuery>,
) -> AppResult<Json<Vec<ServiceSummary>>> {
    let k8s = state.k8s().await?;
    let services = k8s.list_services(query.namespace.as_deref()).await?;
    Ok(Json(services.iter().map(ServiceSummary::from).collect()))
}
