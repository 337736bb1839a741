//! OpenAPI documentation for the Kubeprobe API
//!
//! This module provides Swagger/OpenAPI documentation for all API endpoints.

use utoipa::OpenApi;

/// API Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kubeprobe API",
        version = "1.0.0",
        description = "Pod-level connectivity testing for Kubernetes.\n\n## Features\n- Test whether a pod can reach a service, another pod or an external host\n- Inspect every diagnostic probe that was attempted\n- Run ad hoc commands inside pods\n- List pods and services",
        license(name = "MIT"),
        contact(name = "Kubeprobe Team")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    tags(
        (name = "connectivity", description = "Connectivity tests and the probe catalog"),
        (name = "exec", description = "Command execution inside pods"),
        (name = "resources", description = "Pod and service listings"),
        (name = "cluster", description = "Service health and cluster status")
    ),
    paths(
        // Connectivity
        crate::api::connection::test_connection,
        crate::api::connection::run_connectivity,
        crate::api::connection::list_probes,
        // Exec
        crate::api::exec::pod_exec,
        // Resources
        crate::api::resources::list_pods,
        crate::api::resources::list_services,
        // Cluster
        crate::api::health::health_check,
        crate::api::health::cluster_status,
        crate::api::metrics::metrics_handler,
    ),
    components(
        schemas(
            crate::api::connection::ConnectionRequest,
            crate::api::connection::ConnectivityRequest,
            crate::api::connection::WorkloadRef,
            crate::api::connection::TargetRef,
            crate::api::exec::ExecRequest,
            crate::api::exec::ExecResponse,
            crate::api::health::HealthResponse,
            crate::api::health::ProberStatusResponse,
            crate::k8s::PodSummary,
            crate::k8s::ServiceSummary,
            crate::k8s::ServicePortSummary,
            crate::probe::ConnectivityResult,
            crate::probe::ProbeAttempt,
            crate::probe::ProbeDefinition,
            crate::probe::ProbeCatalog,
            crate::probe::ProbeMode,
            crate::probe::Endpoint,
            crate::probe::EndpointKind,
            crate::probe::ResolvedAddress,
        )
    )
)]
pub struct ApiDoc;
