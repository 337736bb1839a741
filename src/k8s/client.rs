//! Kubernetes client wrapper for Kubeprobe

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::{
    api::{Api, AttachParams, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, instrument, warn};

use crate::error::AppResult;
use crate::probe::{Endpoint, ExecError, ExecOutput, PodExec, ResolutionError};

/// Wrapper around kube::Client with the lookups and exec used by probes
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Create a new K8sClient using the default kubeconfig or in-cluster config
    #[instrument(skip_all)]
    pub async fn new() -> Result<Self> {
        let config = Config::infer().await?;
        let client = Client::try_from(config)?;

        info!("Connected to Kubernetes cluster");

        Ok(Self { client })
    }

    /// Create a K8sClient from an explicit kubeconfig file
    #[instrument]
    pub async fn from_kubeconfig(path: &str) -> Result<Self> {
        let kubeconfig = Kubeconfig::read_from(path)?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        let client = Client::try_from(config)?;

        info!(path, "Connected to Kubernetes cluster");

        Ok(Self { client })
    }

    /// Use the given kubeconfig when set, otherwise infer one
    pub async fn connect(kubeconfig: Option<&str>) -> Result<Self> {
        match kubeconfig {
            Some(path) => Self::from_kubeconfig(path).await,
            None => Self::new().await,
        }
    }

    fn pods(&self, namespace: Option<&str>) -> Api<Pod> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    fn services(&self, namespace: Option<&str>) -> Api<Service> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    /// List pods, across all namespaces when none is given
    #[instrument(skip(self))]
    pub async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>, kube::Error> {
        let list = self.pods(namespace).list(&ListParams::default()).await?;
        debug!(count = list.items.len(), "Listed pods");
        Ok(list.items)
    }

    /// List services, across all namespaces when none is given
    #[instrument(skip(self))]
    pub async fn list_services(&self, namespace: Option<&str>) -> Result<Vec<Service>, kube::Error> {
        let list = self.services(namespace).list(&ListParams::default()).await?;
        debug!(count = list.items.len(), "Listed services");
        Ok(list.items)
    }

    /// Snapshot a pod as a connectivity endpoint
    pub async fn pod_endpoint(&self, name: &str, namespace: &str) -> AppResult<Endpoint> {
        match self.pods(Some(namespace)).get_opt(name).await? {
            Some(pod) => Ok(Endpoint::from_pod(&pod)),
            None => Err(ResolutionError::PodNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            }
            .into()),
        }
    }

    /// Snapshot a service as a connectivity endpoint
    pub async fn service_endpoint(&self, name: &str, namespace: &str) -> AppResult<Endpoint> {
        match self.services(Some(namespace)).get_opt(name).await? {
            Some(svc) => Ok(Endpoint::from_service(&svc)),
            None => Err(ResolutionError::ServiceNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            }
            .into()),
        }
    }

    /// Run `argv` in the pod's default container without stdin or a tty
    #[instrument(skip(self, argv))]
    pub async fn exec_in_pod(
        &self,
        name: &str,
        namespace: &str,
        argv: Vec<String>,
    ) -> Result<ExecOutput, ExecError> {
        let pods = self.pods(Some(namespace));
        let ap = AttachParams {
            stdin: false,
            stdout: true,
            stderr: true,
            tty: false,
            ..Default::default()
        };

        let mut attached = pods
            .exec(name, argv, &ap)
            .await
            .map_err(|e| ExecError::Transport(e.to_string()))?;

        let status = attached.take_status();
        let stdout = attached.stdout();
        let stderr = attached.stderr();
        let (stdout, stderr) = futures::future::join(read_stream(stdout), read_stream(stderr)).await;

        let status = match status {
            Some(status) => status.await,
            None => None,
        };
        attached
            .join()
            .await
            .map_err(|e| ExecError::Transport(e.to_string()))?;

        if let Some(status) = status {
            if status.status.as_deref() == Some("Failure") {
                let message = status
                    .message
                    .or(status.reason)
                    .unwrap_or_else(|| "unknown failure".to_string());
                return Err(ExecError::Command(message));
            }
        }

        Ok(ExecOutput { stdout, stderr })
    }

    /// Check if cluster is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let version = self.client.apiserver_version().await?;
        info!(version = %version.git_version, "Kubernetes cluster is healthy");
        Ok(true)
    }
}

#[async_trait]
impl PodExec for K8sClient {
    async fn exec(
        &self,
        pod: &str,
        namespace: &str,
        argv: Vec<String>,
    ) -> Result<ExecOutput, ExecError> {
        self.exec_in_pod(pod, namespace, argv).await
    }
}

async fn read_stream(reader: Option<impl AsyncRead + Unpin>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buf).await {
            warn!(error = %e, "Exec stream closed early");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
