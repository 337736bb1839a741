//! Connectivity probing engine
//!
//! Answers "can this pod reach that target?" by running diagnostic commands
//! inside the source pod:
//! - [`endpoint`] resolves targets into in-cluster addresses
//! - [`catalog`] holds the ordered probe templates
//! - [`runner`] executes one command and classifies its exit status
//! - [`engine`] walks the catalog and produces the verdict

pub mod catalog;
pub mod endpoint;
pub mod engine;
pub mod runner;

pub use catalog::{CatalogError, ProbeCatalog, ProbeDefinition};
pub use endpoint::{
    find_pod, find_service, resolve, Endpoint, EndpointKind, ResolutionError, ResolvedAddress,
};
pub use engine::{ConnectivityEngine, ConnectivityResult, ProbeAttempt, ProbeMode};
pub use runner::{
    ExecError, ExecMode, ExecOutput, FailureReason, PodExec, ProbeOutcome, ProbeRunner,
};
