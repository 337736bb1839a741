//! Listing summaries for pods and services

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Pod, Service};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PodSummary {
    pub name: String,
    pub namespace: String,
    pub ip: Option<String>,
    pub phase: Option<String>,
    pub node: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Pod> for PodSummary {
    fn from(pod: &Pod) -> Self {
        let status = pod.status.as_ref();
        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            ip: status.and_then(|s| s.pod_ip.clone()),
            phase: status.and_then(|s| s.phase.clone()),
            node: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
            created_at: pod.metadata.creation_timestamp.as_ref().map(|t| t.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ServicePortSummary {
    pub name: Option<String>,
    pub port: i32,
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ServiceSummary {
    pub name: String,
    pub namespace: String,
    pub cluster_ip: Option<String>,
    pub ports: Vec<ServicePortSummary>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Service> for ServiceSummary {
    fn from(svc: &Service) -> Self {
        let spec = svc.spec.as_ref();
        let ports = spec
            .and_then(|s| s.ports.as_ref())
            .map(|ports| {
                ports
                    .iter()
                    .map(|p| ServicePortSummary {
                        name: p.name.clone(),
                        port: p.port,
                        protocol: p.protocol.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: svc.metadata.name.clone().unwrap_or_default(),
            namespace: svc.metadata.namespace.clone().unwrap_or_default(),
            cluster_ip: spec.and_then(|s| s.cluster_ip.clone()),
            ports,
            created_at: svc.metadata.creation_timestamp.as_ref().map(|t| t.0),
        }
    }
}
