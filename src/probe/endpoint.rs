//! Connectivity endpoints and address resolution
//!
//! An [`Endpoint`] is a read-only snapshot of a pod, service or external host
//! taken once per connectivity test. [`resolve`] turns it into the address a
//! command running inside the source container would use, following the
//! cluster DNS conventions:
//! - service: `<name>.<namespace>`
//! - pod: `<ip with dots as dashes>.<namespace>.pod`
//! - external: the host or URL verbatim

use std::fmt;

use k8s_openapi::api::core::v1::{Pod, Service};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("pod {namespace}/{name} not found")]
    PodNotFound { name: String, namespace: String },

    #[error("service {namespace}/{name} not found")]
    ServiceNotFound { name: String, namespace: String },

    #[error("pod {namespace}/{name} has no assigned IP yet")]
    NoPodIp { name: String, namespace: String },

    #[error("external target is empty")]
    EmptyTarget,

    #[error("external target contains control characters: {0:?}")]
    InvalidTarget(String),

    #[error("source must be a pod, got {0}")]
    SourceNotPod(String),
}

/// Kind of a connectivity endpoint
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EndpointKind {
    Pod,
    Service,
    External,
}

/// Source or target of a connectivity test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Endpoint {
    Pod {
        name: String,
        namespace: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ip: Option<String>,
    },
    Service {
        name: String,
        namespace: String,
    },
    External {
        host: String,
    },
}

impl Endpoint {
    pub fn pod(name: impl Into<String>, namespace: impl Into<String>, ip: Option<String>) -> Self {
        Endpoint::Pod {
            name: name.into(),
            namespace: namespace.into(),
            ip,
        }
    }

    pub fn service(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Endpoint::Service {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn external(host: impl Into<String>) -> Self {
        Endpoint::External { host: host.into() }
    }

    pub fn kind(&self) -> EndpointKind {
        match self {
            Endpoint::Pod { .. } => EndpointKind::Pod,
            Endpoint::Service { .. } => EndpointKind::Service,
            Endpoint::External { .. } => EndpointKind::External,
        }
    }

    /// Name of the workload, or the host for external endpoints
    pub fn name(&self) -> &str {
        match self {
            Endpoint::Pod { name, .. } | Endpoint::Service { name, .. } => name,
            Endpoint::External { host } => host,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Endpoint::Pod { namespace, .. } | Endpoint::Service { namespace, .. } => {
                Some(namespace)
            }
            Endpoint::External { .. } => None,
        }
    }

    /// Build a pod endpoint from a cluster object
    pub fn from_pod(pod: &Pod) -> Self {
        let ip = pod
            .status
            .as_ref()
            .and_then(|s| s.pod_ip.clone())
            .filter(|ip| !ip.is_empty());
        Endpoint::Pod {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            ip,
        }
    }

    /// Build a service endpoint from a cluster object
    pub fn from_service(svc: &Service) -> Self {
        Endpoint::Service {
            name: svc.metadata.name.clone().unwrap_or_default(),
            namespace: svc.metadata.namespace.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Pod { name, namespace, .. } => write!(f, "pod {}/{}", namespace, name),
            Endpoint::Service { name, namespace } => write!(f, "service {}/{}", namespace, name),
            Endpoint::External { host } => write!(f, "external {}", host),
        }
    }
}

/// Address string plus the port probes should use, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResolvedAddress {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl ResolvedAddress {
    pub fn has_port(&self) -> bool {
        self.port.is_some()
    }
}

/// Resolve a target endpoint into the address used by probe commands.
///
/// A port of `0` is the same as no port.
pub fn resolve(target: &Endpoint, port: Option<u16>) -> Result<ResolvedAddress, ResolutionError> {
    let port = port.filter(|p| *p != 0);

    let address = match target {
        Endpoint::Service { name, namespace } => {
            if namespace.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", name, namespace)
            }
        }
        Endpoint::Pod {
            name,
            namespace,
            ip,
        } => {
            let ip = ip
                .as_deref()
                .filter(|ip| !ip.is_empty())
                .ok_or_else(|| ResolutionError::NoPodIp {
                    name: name.clone(),
                    namespace: namespace.clone(),
                })?;
            format!("{}.{}.pod", ip.replace('.', "-"), namespace)
        }
        Endpoint::External { host } => {
            if host.trim().is_empty() {
                return Err(ResolutionError::EmptyTarget);
            }
            if host.contains(char::is_control) {
                return Err(ResolutionError::InvalidTarget(host.clone()));
            }
            host.clone()
        }
    };

    Ok(ResolvedAddress { address, port })
}

/// Find a pod by name and namespace in a listing
pub fn find_pod(pods: &[Pod], name: &str, namespace: &str) -> Result<Endpoint, ResolutionError> {
    pods.iter()
        .find(|p| {
            p.metadata.name.as_deref() == Some(name)
                && p.metadata.namespace.as_deref() == Some(namespace)
        })
        .map(Endpoint::from_pod)
        .ok_or_else(|| ResolutionError::PodNotFound {
            name: name.to_string(),
            namespace: namespace.to_string(),
        })
}

/// Find a service by name and namespace in a listing
pub fn find_service(
    services: &[Service],
    name: &str,
    namespace: &str,
) -> Result<Endpoint, ResolutionError> {
    services
        .iter()
        .find(|s| {
            s.metadata.name.as_deref() == Some(name)
                && s.metadata.namespace.as_deref() == Some(namespace)
        })
        .map(Endpoint::from_service)
        .ok_or_else(|| ResolutionError::ServiceNotFound {
            name: name.to_string(),
            namespace: namespace.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod(name: &str, ns: &str, ip: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(ns.to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                pod_ip: ip.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_service_address() {
        let addr = resolve(&Endpoint::service("db", "data"), None).unwrap();
        assert_eq!(addr.address, "db.data");
        assert_eq!(addr.port, None);
    }

    #[test]
    fn test_service_without_namespace() {
        let addr = resolve(&Endpoint::service("db", ""), Some(5432)).unwrap();
        assert_eq!(addr.address, "db");
        assert_eq!(addr.port, Some(5432));
    }

    #[test]
    fn test_pod_address() {
        let target = Endpoint::pod("api-0", "app", Some("10.1.2.3".into()));
        let addr = resolve(&target, None).unwrap();
        assert_eq!(addr.address, "10-1-2-3.app.pod");
    }

    #[test]
    fn test_pod_without_ip() {
        let target = Endpoint::pod("api-0", "app", None);
        assert_eq!(
            resolve(&target, None),
            Err(ResolutionError::NoPodIp {
                name: "api-0".into(),
                namespace: "app".into()
            })
        );

        let target = Endpoint::pod("api-0", "app", Some(String::new()));
        assert!(resolve(&target, None).is_err());
    }

    #[test]
    fn test_external_verbatim() {
        let addr = resolve(&Endpoint::external("https://example.com"), None).unwrap();
        assert_eq!(addr.address, "https://example.com");
        assert!(!addr.has_port());

        assert_eq!(
            resolve(&Endpoint::external("  "), None),
            Err(ResolutionError::EmptyTarget)
        );
    }

    #[test]
    fn test_external_control_characters_rejected() {
        let err = resolve(&Endpoint::external("example.com\0;reboot"), None).unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidTarget(_)));
        assert!(resolve(&Endpoint::external("host\nid"), Some(80)).is_err());

        let addr = resolve(&Endpoint::external("http://h/?a=1&b=$x"), None).unwrap();
        assert_eq!(addr.address, "http://h/?a=1&b=$x");
    }

    #[test]
    fn test_zero_port_is_absent() {
        let addr = resolve(&Endpoint::service("db", "data"), Some(0)).unwrap();
        assert_eq!(addr.port, None);
    }

    #[test]
    fn test_find_pod() {
        let pods = vec![pod("web-1", "app", Some("10.0.0.7")), pod("web-1", "other", None)];

        let found = find_pod(&pods, "web-1", "app").unwrap();
        assert_eq!(found, Endpoint::pod("web-1", "app", Some("10.0.0.7".into())));

        let err = find_pod(&pods, "web-2", "app").unwrap_err();
        assert!(matches!(err, ResolutionError::PodNotFound { .. }));
    }

    #[test]
    fn test_find_service_requires_namespace_match() {
        let services = vec![Service {
            metadata: ObjectMeta {
                name: Some("db".into()),
                namespace: Some("data".into()),
                ..Default::default()
            },
            ..Default::default()
        }];

        assert!(find_service(&services, "db", "data").is_ok());
        assert!(matches!(
            find_service(&services, "db", "default"),
            Err(ResolutionError::ServiceNotFound { .. })
        ));
    }

    #[test]
    fn test_endpoint_serde_tagged() {
        let json = serde_json::to_value(Endpoint::service("db", "data")).unwrap();
        assert_eq!(json["kind"], "service");
        assert_eq!(json["name"], "db");

        let parsed: Endpoint =
            serde_json::from_str(r#"{"kind":"external","host":"example.com"}"#).unwrap();
        assert_eq!(parsed.kind(), EndpointKind::External);
        assert_eq!(parsed.to_string(), "external example.com");
    }
}
