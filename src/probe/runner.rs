//! Running probe commands inside a source pod
//!
//! The runner only depends on the narrow [`PodExec`] capability: run an argv
//! in a named pod and hand back stdout and stderr. Success is decided from the
//! command's exit status, never from stderr content.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::endpoint::Endpoint;

/// Printed after the probe finishes so the exit status survives the exec channel
pub const EXIT_MARKER: &str = "__kubeprobe_exit=";

/// Exit status `sh` reports when the executable does not exist
const SHELL_NOT_FOUND: i32 = 127;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// Could not open or keep the exec stream (pod gone, container not running, ...)
    #[error("exec transport error: {0}")]
    Transport(String),

    /// The API server reported the process as failed
    #[error("command failed: {0}")]
    Command(String),
}

impl ExecError {
    /// Whether the container runtime could not find the executable
    pub fn is_command_not_found(&self) -> bool {
        let msg = match self {
            ExecError::Transport(m) | ExecError::Command(m) => m.to_lowercase(),
        };
        msg.contains("executable file not found") || msg.contains("no such file or directory")
    }
}

/// Captured output of a command run in a pod
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run a command inside a running pod
#[async_trait]
pub trait PodExec: Send + Sync {
    async fn exec(
        &self,
        pod: &str,
        namespace: &str,
        argv: Vec<String>,
    ) -> Result<ExecOutput, ExecError>;
}

/// What the caller wants back from an exec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecMode {
    /// Run the command as-is and return its output
    FullOutput,
    /// Discard the command's output and report only its exit status
    StatusOnly,
}

/// Why a probe could not confirm reachability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The tool is not installed in the source container
    CommandNotFound,
    /// The tool ran and exited non-zero
    ExitStatus(i32),
    /// The exec channel itself failed
    Exec(String),
    /// The command finished without reporting an exit status
    NoStatus,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::CommandNotFound => write!(f, "command not found"),
            FailureReason::ExitStatus(code) => write!(f, "exit status {}", code),
            FailureReason::Exec(msg) => write!(f, "exec failed: {}", msg),
            FailureReason::NoStatus => write!(f, "no exit status reported"),
        }
    }
}

/// Normalized result of one command run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub failure: Option<FailureReason>,
}

impl ProbeOutcome {
    fn failed(stdout: String, stderr: String, exit_code: Option<i32>, reason: FailureReason) -> Self {
        Self {
            succeeded: false,
            stdout,
            stderr,
            exit_code,
            failure: Some(reason),
        }
    }
}

/// Split a command into argv on whitespace; no shell is involved
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

/// Wrap a command so only its exit status reaches stdout
pub fn status_only_argv(command: &str) -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("{} >/dev/null 2>&1; echo \"{}$?\"", command, EXIT_MARKER),
    ]
}

/// Find the exit status reported by [`status_only_argv`]
pub fn parse_exit_code(stdout: &str) -> Option<i32> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(EXIT_MARKER))
        .and_then(|code| code.trim().parse().ok())
}

/// Executes commands in a source pod and classifies the outcome
#[derive(Clone)]
pub struct ProbeRunner {
    exec: Arc<dyn PodExec>,
}

impl ProbeRunner {
    pub fn new(exec: Arc<dyn PodExec>) -> Self {
        Self { exec }
    }

    /// Run `command` inside `source`.
    ///
    /// Failures of any kind are returned as an unsuccessful outcome, never as
    /// an error.
    pub async fn run(&self, source: &Endpoint, command: &str, mode: ExecMode) -> ProbeOutcome {
        let (pod, namespace) = match source {
            Endpoint::Pod {
                name, namespace, ..
            } => (name.as_str(), namespace.as_str()),
            other => {
                return ProbeOutcome::failed(
                    String::new(),
                    String::new(),
                    None,
                    FailureReason::Exec(format!("cannot exec into {}", other)),
                )
            }
        };

        let argv = match mode {
            ExecMode::FullOutput => split_command(command),
            ExecMode::StatusOnly => status_only_argv(command),
        };
        if argv.is_empty() {
            return ProbeOutcome::failed(
                String::new(),
                String::new(),
                None,
                FailureReason::Exec("empty command".to_string()),
            );
        }

        debug!(pod, namespace, command, %mode, "Running command in pod");
        let result = self.exec.exec(pod, namespace, argv).await;

        match mode {
            ExecMode::StatusOnly => classify_status(result),
            ExecMode::FullOutput => classify_full(result),
        }
    }
}

fn classify_exec_error(err: &ExecError) -> FailureReason {
    if err.is_command_not_found() {
        FailureReason::CommandNotFound
    } else {
        FailureReason::Exec(err.to_string())
    }
}

fn classify_status(result: Result<ExecOutput, ExecError>) -> ProbeOutcome {
    let output = match result {
        Ok(output) => output,
        Err(err) => {
            let reason = classify_exec_error(&err);
            return ProbeOutcome::failed(String::new(), err.to_string(), None, reason);
        }
    };

    match parse_exit_code(&output.stdout) {
        Some(0) => ProbeOutcome {
            succeeded: true,
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: Some(0),
            failure: None,
        },
        Some(SHELL_NOT_FOUND) => ProbeOutcome::failed(
            output.stdout,
            output.stderr,
            Some(SHELL_NOT_FOUND),
            FailureReason::CommandNotFound,
        ),
        Some(code) => ProbeOutcome::failed(
            output.stdout,
            output.stderr,
            Some(code),
            FailureReason::ExitStatus(code),
        ),
        None => ProbeOutcome::failed(output.stdout, output.stderr, None, FailureReason::NoStatus),
    }
}

fn classify_full(result: Result<ExecOutput, ExecError>) -> ProbeOutcome {
    match result {
        Ok(output) => ProbeOutcome {
            succeeded: true,
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: None,
            failure: None,
        },
        Err(err) => {
            let reason = classify_exec_error(&err);
            ProbeOutcome::failed(String::new(), err.to_string(), None, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        argv: Mutex<Vec<Vec<String>>>,
        reply: Result<ExecOutput, ExecError>,
    }

    #[async_trait]
    impl PodExec for Recorder {
        async fn exec(
            &self,
            _pod: &str,
            _namespace: &str,
            argv: Vec<String>,
        ) -> Result<ExecOutput, ExecError> {
            self.argv.lock().unwrap().push(argv);
            self.reply.clone()
        }
    }

    fn runner(reply: Result<ExecOutput, ExecError>) -> (ProbeRunner, Arc<Recorder>) {
        let rec = Arc::new(Recorder {
            argv: Mutex::new(Vec::new()),
            reply,
        });
        (ProbeRunner::new(rec.clone()), rec)
    }

    fn stdout(s: &str) -> Result<ExecOutput, ExecError> {
        Ok(ExecOutput {
            stdout: s.to_string(),
            stderr: String::new(),
        })
    }

    fn source() -> Endpoint {
        Endpoint::pod("web-1", "app", Some("10.0.0.1".into()))
    }

    #[test]
    fn test_parse_exit_code() {
        assert_eq!(parse_exit_code("__kubeprobe_exit=0\n"), Some(0));
        assert_eq!(parse_exit_code("noise\n__kubeprobe_exit=4"), Some(4));
        assert_eq!(parse_exit_code("0\n"), None);
        assert_eq!(parse_exit_code(""), None);
    }

    #[test]
    fn test_status_only_wraps_in_shell() {
        let argv = status_only_argv("nc -z db.data 5432");
        assert_eq!(argv[0], "sh");
        assert_eq!(argv[1], "-c");
        assert_eq!(
            argv[2],
            "nc -z db.data 5432 >/dev/null 2>&1; echo \"__kubeprobe_exit=$?\""
        );
    }

    #[tokio::test]
    async fn test_exit_zero_succeeds() {
        let (runner, rec) = runner(stdout("__kubeprobe_exit=0\n"));
        let outcome = runner.run(&source(), "wget db.data", ExecMode::StatusOnly).await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(rec.argv.lock().unwrap()[0][0], "sh");
    }

    #[tokio::test]
    async fn test_stderr_does_not_decide_success() {
        let (runner, _) = runner(Ok(ExecOutput {
            stdout: "__kubeprobe_exit=0".into(),
            stderr: "warning: something benign".into(),
        }));
        let outcome = runner.run(&source(), "curl db.data", ExecMode::StatusOnly).await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.stderr, "warning: something benign");
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails() {
        let (runner, _) = runner(stdout("__kubeprobe_exit=1\n"));
        let outcome = runner.run(&source(), "wget db.data", ExecMode::StatusOnly).await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.failure, Some(FailureReason::ExitStatus(1)));
    }

    #[tokio::test]
    async fn test_missing_tool_is_distinguished() {
        let (runner, _) = runner(stdout("__kubeprobe_exit=127\n"));
        let outcome = runner.run(&source(), "nmap -p 80 db", ExecMode::StatusOnly).await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.failure, Some(FailureReason::CommandNotFound));

        let (runner, _) = self::runner(Err(ExecError::Command(
            "exec: \"sh\": executable file not found in $PATH".into(),
        )));
        let outcome = runner.run(&source(), "wget db", ExecMode::StatusOnly).await;
        assert_eq!(outcome.failure, Some(FailureReason::CommandNotFound));
    }

    #[tokio::test]
    async fn test_transport_error_is_probe_failure() {
        let (runner, _) = runner(Err(ExecError::Transport("connection reset".into())));
        let outcome = runner.run(&source(), "wget db", ExecMode::StatusOnly).await;
        assert!(!outcome.succeeded);
        assert!(matches!(outcome.failure, Some(FailureReason::Exec(_))));
        assert!(outcome.stderr.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_missing_marker() {
        let (runner, _) = runner(stdout(""));
        let outcome = runner.run(&source(), "wget db", ExecMode::StatusOnly).await;
        assert_eq!(outcome.failure, Some(FailureReason::NoStatus));
    }

    #[tokio::test]
    async fn test_full_output_splits_fields() {
        let (runner, rec) = runner(stdout("root\n"));
        let outcome = runner.run(&source(), "  ls   -la /tmp ", ExecMode::FullOutput).await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.stdout, "root\n");
        assert_eq!(rec.argv.lock().unwrap()[0], vec!["ls", "-la", "/tmp"]);
    }

    #[tokio::test]
    async fn test_non_pod_source_is_rejected() {
        let (runner, rec) = runner(stdout("__kubeprobe_exit=0"));
        let outcome = runner
            .run(&Endpoint::service("db", "data"), "wget x", ExecMode::StatusOnly)
            .await;
        assert!(!outcome.succeeded);
        assert!(rec.argv.lock().unwrap().is_empty());
    }
}
