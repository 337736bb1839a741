//! Connectivity engine: resolve once, then walk the catalog until a probe
//! confirms reachability.
//!
//! Per invocation: `Resolving -> Probing(0) -> Probing(1) -> ... -> Succeeded | Failed`.
//! A resolution error ends the run before any probe is attempted. Running out
//! of probes is a negative verdict, not an error.
//!
//! Probes run strictly one at a time. The future returned by
//! [`ConnectivityEngine::test_connectivity`] can be dropped at any point to
//! cancel the in-flight exec and skip the remaining probes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use super::catalog::{ProbeCatalog, ProbeDefinition};
use super::endpoint::{resolve, Endpoint, ResolutionError, ResolvedAddress};
use super::runner::{ExecMode, FailureReason, PodExec, ProbeOutcome, ProbeRunner};

/// How many probes a connectivity test may try
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProbeMode {
    /// Walk the whole catalog, stopping at the first success
    #[default]
    Fallback,
    /// A single `wget` probe with no fallback; the port is ignored
    Legacy,
}

/// One probe that was actually run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProbeAttempt {
    pub probe: ProbeDefinition,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub failure: Option<FailureReason>,
}

impl ProbeAttempt {
    fn new(probe: &ProbeDefinition, command: String, outcome: ProbeOutcome) -> Self {
        Self {
            probe: probe.clone(),
            command,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            succeeded: outcome.succeeded,
            exit_code: outcome.exit_code,
            failure: outcome.failure,
        }
    }
}

/// Verdict of a connectivity test plus every attempt made to reach it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConnectivityResult {
    pub reachable: bool,
    pub source: Endpoint,
    pub target: Endpoint,
    pub address: ResolvedAddress,
    pub mode: ProbeMode,
    pub attempts: Vec<ProbeAttempt>,
    /// Tools left out because they need a port and none was given
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl ConnectivityResult {
    /// The probe that confirmed reachability, if any
    pub fn successful_attempt(&self) -> Option<&ProbeAttempt> {
        self.attempts.iter().find(|a| a.succeeded)
    }
}

/// Orchestrates address resolution and the probe catalog
#[derive(Clone)]
pub struct ConnectivityEngine {
    catalog: Arc<ProbeCatalog>,
    legacy: Arc<ProbeCatalog>,
    mode: ProbeMode,
    runner: ProbeRunner,
}

impl ConnectivityEngine {
    pub fn new(catalog: Arc<ProbeCatalog>, mode: ProbeMode, exec: Arc<dyn PodExec>) -> Self {
        Self {
            catalog,
            legacy: Arc::new(ProbeCatalog::legacy()),
            mode,
            runner: ProbeRunner::new(exec),
        }
    }

    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Catalog walked in the current mode
    pub fn catalog(&self) -> &ProbeCatalog {
        match self.mode {
            ProbeMode::Fallback => &self.catalog,
            ProbeMode::Legacy => &self.legacy,
        }
    }

    /// Test whether `source` can reach `target`.
    ///
    /// Errors only when the source or target cannot be resolved; an
    /// unreachable target is `Ok` with `reachable == false`.
    #[instrument(skip(self, source, target), fields(source = %source, target = %target, mode = %self.mode))]
    pub async fn test_connectivity(
        &self,
        source: &Endpoint,
        target: &Endpoint,
        port: Option<u16>,
    ) -> Result<ConnectivityResult, ResolutionError> {
        if !matches!(source, Endpoint::Pod { .. }) {
            return Err(ResolutionError::SourceNotPod(source.to_string()));
        }

        let mut address = resolve(target, port)?;
        if self.mode == ProbeMode::Legacy {
            address.port = None;
        }
        debug!(address = %address.address, port = ?address.port, "Resolved target");

        let mut attempts = Vec::new();
        let mut skipped = Vec::new();
        let mut reachable = false;

        for probe in self.catalog().iter() {
            let Some(command) = probe.build_command(&address) else {
                debug!(tool = %probe.tool, "Skipping probe, no port given");
                skipped.push(probe.tool.clone());
                continue;
            };

            let outcome = self
                .runner
                .run(source, &command, ExecMode::StatusOnly)
                .await;
            record_attempt(probe, &outcome);

            let succeeded = outcome.succeeded;
            attempts.push(ProbeAttempt::new(probe, command, outcome));
            if succeeded {
                reachable = true;
                break;
            }
        }

        metrics::counter!(
            "kubeprobe_connectivity_tests_total",
            1,
            "mode" => self.mode.to_string(),
            "reachable" => reachable.to_string()
        );
        info!(
            reachable,
            attempts = attempts.len(),
            skipped = skipped.len(),
            "Connectivity test finished"
        );

        Ok(ConnectivityResult {
            reachable,
            source: source.clone(),
            target: target.clone(),
            address,
            mode: self.mode,
            attempts,
            skipped,
        })
    }
}

fn record_attempt(probe: &ProbeDefinition, outcome: &ProbeOutcome) {
    let label = match &outcome.failure {
        None => "success",
        Some(FailureReason::CommandNotFound) => "command_not_found",
        Some(FailureReason::ExitStatus(_)) => "exit_status",
        Some(FailureReason::Exec(_)) => "exec_error",
        Some(FailureReason::NoStatus) => "no_status",
    };
    metrics::counter!(
        "kubeprobe_probe_attempts_total",
        1,
        "tool" => probe.tool.clone(),
        "outcome" => label
    );
    match &outcome.failure {
        None => info!(tool = %probe.tool, "Probe succeeded"),
        Some(reason) => debug!(tool = %probe.tool, %reason, "Probe failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::runner::{ExecError, ExecOutput, EXIT_MARKER};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Exec stub answering by tool name; unknown tools exit 1
    struct ScriptedExec {
        exit_codes: HashMap<&'static str, i32>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedExec {
        fn new(exit_codes: &[(&'static str, i32)]) -> Arc<Self> {
            Arc::new(Self {
                exit_codes: exit_codes.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PodExec for ScriptedExec {
        async fn exec(
            &self,
            _pod: &str,
            _namespace: &str,
            argv: Vec<String>,
        ) -> Result<ExecOutput, ExecError> {
            let script = argv.last().cloned().unwrap_or_default();
            let tool = script.split_whitespace().next().unwrap_or_default().to_string();
            self.calls.lock().unwrap().push(tool.clone());
            let code = self.exit_codes.get(tool.as_str()).copied().unwrap_or(1);
            Ok(ExecOutput {
                stdout: format!("{}{}\n", EXIT_MARKER, code),
                stderr: String::new(),
            })
        }
    }

    fn catalog(probes: &[(&str, &str, bool)]) -> Arc<ProbeCatalog> {
        Arc::new(
            ProbeCatalog::new(
                probes
                    .iter()
                    .map(|(tool, args, port)| ProbeDefinition::new(tool, args, *port))
                    .collect(),
            )
            .unwrap(),
        )
    }

    fn source() -> Endpoint {
        Endpoint::pod("web-1", "app", Some("10.0.0.5".into()))
    }

    #[tokio::test]
    async fn test_port_required_probes_skipped_without_port() {
        let exec = ScriptedExec::new(&[]);
        let cat = catalog(&[
            ("a", "{address}", false),
            ("b", "{address} {port}", true),
            ("c", "{address}", false),
        ]);
        let engine = ConnectivityEngine::new(cat, ProbeMode::Fallback, exec.clone());

        let result = engine
            .test_connectivity(&source(), &Endpoint::service("db", "data"), None)
            .await
            .unwrap();

        assert!(!result.reachable);
        assert_eq!(exec.calls(), ["a", "c"]);
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.skipped, ["b"]);
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let exec = ScriptedExec::new(&[("curl", 0), ("nc", 0)]);
        let engine = ConnectivityEngine::new(
            Arc::new(ProbeCatalog::default()),
            ProbeMode::Fallback,
            exec.clone(),
        );

        let result = engine
            .test_connectivity(&source(), &Endpoint::service("db", "data"), Some(5432))
            .await
            .unwrap();

        assert!(result.reachable);
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(exec.calls(), ["wget", "curl"]);
        assert_eq!(result.successful_attempt().unwrap().probe.tool, "curl");
    }

    #[tokio::test]
    async fn test_exhaustion_is_negative_result() {
        let exec = ScriptedExec::new(&[]);
        let engine = ConnectivityEngine::new(
            Arc::new(ProbeCatalog::default()),
            ProbeMode::Fallback,
            exec.clone(),
        );

        let result = engine
            .test_connectivity(&source(), &Endpoint::service("db", "data"), Some(80))
            .await
            .unwrap();

        assert!(!result.reachable);
        assert_eq!(result.attempts.len(), ProbeCatalog::default().len());
        assert!(result.attempts.iter().all(|a| !a.succeeded));
        assert!(result.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_resolution_error_runs_no_probes() {
        let exec = ScriptedExec::new(&[("wget", 0)]);
        let engine = ConnectivityEngine::new(
            Arc::new(ProbeCatalog::default()),
            ProbeMode::Fallback,
            exec.clone(),
        );

        let err = engine
            .test_connectivity(&source(), &Endpoint::pod("db-0", "data", None), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolutionError::NoPodIp { .. }));
        assert!(exec.calls().is_empty());
    }

    #[tokio::test]
    async fn test_source_must_be_pod() {
        let exec = ScriptedExec::new(&[("wget", 0)]);
        let engine = ConnectivityEngine::new(
            Arc::new(ProbeCatalog::default()),
            ProbeMode::Fallback,
            exec.clone(),
        );

        let err = engine
            .test_connectivity(
                &Endpoint::service("web", "app"),
                &Endpoint::external("example.com"),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::SourceNotPod(_)));
        assert!(exec.calls().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_mode_single_probe() {
        let exec = ScriptedExec::new(&[("curl", 0)]);
        let engine = ConnectivityEngine::new(
            Arc::new(ProbeCatalog::default()),
            ProbeMode::Fallback,
            exec.clone(),
        )
        .with_mode(ProbeMode::Legacy);

        let result = engine
            .test_connectivity(&source(), &Endpoint::service("db", "data"), Some(5432))
            .await
            .unwrap();

        assert!(!result.reachable);
        assert_eq!(result.mode, ProbeMode::Legacy);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].command, "wget --spider --timeout=1 db.data");
        assert_eq!(result.address.port, None);
    }

    #[test]
    fn test_probe_mode_parse() {
        assert_eq!("legacy".parse::<ProbeMode>().unwrap(), ProbeMode::Legacy);
        assert_eq!("Fallback".parse::<ProbeMode>().unwrap(), ProbeMode::Fallback);
        assert!("parallel".parse::<ProbeMode>().is_err());
        assert_eq!(ProbeMode::default(), ProbeMode::Fallback);
    }
}
