//! Ad hoc command execution inside a pod

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::probe::{ExecMode, ProbeOutcome, ProbeRunner};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ExecRequest {
    pub pod_name: String,
    #[serde(default)]
    pub pod_namespace: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ExecResponse {
    pub command_output: String,
    pub error: bool,
}

impl From<ProbeOutcome> for ExecResponse {
    /// stdout when the command printed anything, stderr otherwise
    fn from(outcome: ProbeOutcome) -> Self {
        if outcome.succeeded && !outcome.stdout.is_empty() {
            ExecResponse {
                command_output: outcome.stdout,
                error: false,
            }
        } else {
            ExecResponse {
                command_output: outcome.stderr,
                error: true,
            }
        }
    }
}

/// Run a command in a pod and return its output
#[utoipa::path(
    post,
    path = "/api/pod-exec",
    tag = "exec",
    request_body = ExecRequest,
    responses(
        (status = 200, description = "Command output", body = ExecResponse),
        (status = 400, description = "Malformed request"),
        (status = 404, description = "Pod not found"),
        (status = 503, description = "Cluster not connected"),
    )
)]
pub async fn pod_exec(
    State(state): State<AppState>,
    payload: Result<Json<ExecRequest>, JsonRejection>,
) -> AppResult<Json<ExecResponse>> {
    let Json(req) = payload.map_err(|e| AppError::bad_request(&e.body_text()))?;
    if req.command.trim().is_empty() {
        return Err(AppError::bad_request("Command must not be empty"));
    }

    let k8s = state.k8s().await?;
    let pod = k8s
        .pod_endpoint(&req.pod_name, state.namespace_or_default(&req.pod_namespace))
        .await?;

    let runner = ProbeRunner::new(Arc::new(k8s));
    let outcome = runner.run(&pod, &req.command, ExecMode::FullOutput).await;

    Ok(Json(ExecResponse::from(outcome)))
}
