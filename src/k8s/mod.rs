//! Kubernetes integration module for Kubeprobe
//!
//! This module handles all interactions with the cluster:
//! - Listing pods and services to build connectivity endpoints
//! - Executing probe commands inside running pods

mod client;
mod resources;

pub use client::K8sClient;
pub use resources::{PodSummary, ServicePortSummary, ServiceSummary};
