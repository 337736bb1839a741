use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kubeprobe::error::AppError;
use kubeprobe::k8s::{K8sClient, PodSummary, ServiceSummary};
use kubeprobe::probe::{ConnectivityEngine, ConnectivityResult, Endpoint, ProbeCatalog, ProbeMode};
use tracing::debug;

#[derive(Parser)]
#[command(name = "kubeprobe", about = "Check connectivity from Kubernetes pods")]
struct Cli {
    /// Kubeconfig file (defaults to $KUBECONFIG, ~/.kube/config or in-cluster)
    #[arg(long, global = true)]
    kubeconfig: Option<String>,

    /// YAML probe catalog replacing the built-in one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Try a single wget probe with no fallback
    #[arg(long, global = true)]
    legacy: bool,

    /// Print every probe attempt
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check connection from a pod to a target
    Connection {
        #[command(subcommand)]
        action: ConnectionAction,
    },
    /// List pods
    Pods {
        #[arg(short, long)]
        namespace: Option<String>,
    },
    /// List services
    Services {
        #[arg(short, long)]
        namespace: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConnectionAction {
    /// Check connection from a pod to a service
    #[command(name = "pod-to-svc")]
    PodToSvc {
        pod: String,
        service: String,
        /// Pod namespace
        #[arg(short = 'n', long = "pod-ns", default_value = "default")]
        pod_ns: String,
        /// Service namespace
        #[arg(short = 's', long = "svc-ns", default_value = "default")]
        svc_ns: String,
        /// Service port
        #[arg(short = 'p', long = "svc-port", default_value_t = 0)]
        svc_port: u16,
    },
    /// Check connection from a pod to another pod
    #[command(name = "pod-to-pod")]
    PodToPod {
        pod: String,
        target: String,
        /// Pod namespace
        #[arg(short = 'n', long = "pod-ns", default_value = "default")]
        pod_ns: String,
        /// Target pod namespace
        #[arg(short = 't', long = "target-ns", default_value = "default")]
        target_ns: String,
        /// Target pod port
        #[arg(short = 'p', long = "target-port", default_value_t = 0)]
        target_port: u16,
    },
    /// Check connection from a pod to an external endpoint
    #[command(name = "pod-to-ext")]
    PodToExt {
        pod: String,
        url: String,
        /// Pod namespace
        #[arg(short = 'n', long = "pod-ns", default_value = "default")]
        pod_ns: String,
        /// External endpoint port
        #[arg(short = 'p', long = "ext-port", default_value_t = 443)]
        ext_port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let k8s = match K8sClient::connect(cli.kubeconfig.as_deref()).await {
        Ok(k8s) => k8s,
        Err(e) => {
            eprintln!("Error: cannot connect to the cluster: {}", e);
            std::process::exit(1);
        }
    };

    match &cli.command {
        Commands::Connection { action } => {
            let catalog = match &cli.catalog {
                Some(path) => ProbeCatalog::load(path)?,
                None => ProbeCatalog::default(),
            };
            let mode = if cli.legacy {
                ProbeMode::Legacy
            } else {
                ProbeMode::Fallback
            };
            let engine = ConnectivityEngine::new(Arc::new(catalog), mode, Arc::new(k8s.clone()));
            run_connection(&k8s, &engine, action, cli.verbose).await;
        }
        Commands::Pods { namespace } => {
            let pods = k8s.list_pods(namespace.as_deref()).await?;
            println!("{:<24} {:<40} {:<16} {}", "NAMESPACE", "NAME", "IP", "PHASE");
            for pod in pods.iter().map(PodSummary::from) {
                println!(
                    "{:<24} {:<40} {:<16} {}",
                    pod.namespace,
                    pod.name,
                    pod.ip.as_deref().unwrap_or("-"),
                    pod.phase.as_deref().unwrap_or("Unknown")
                );
            }
            if pods.is_empty() {
                println!("(no pods found)");
            }
        }
        Commands::Services { namespace } => {
            let services = k8s.list_services(namespace.as_deref()).await?;
            println!("{:<24} {:<40} {:<16} {}", "NAMESPACE", "NAME", "CLUSTER-IP", "PORTS");
            for svc in services.iter().map(ServiceSummary::from) {
                let ports: Vec<String> = svc.ports.iter().map(|p| p.port.to_string()).collect();
                println!(
                    "{:<24} {:<40} {:<16} {}",
                    svc.namespace,
                    svc.name,
                    svc.cluster_ip.as_deref().unwrap_or("-"),
                    ports.join(",")
                );
            }
            if services.is_empty() {
                println!("(no services found)");
            }
        }
    }

    Ok(())
}

/// Resolve the endpoints, run the test and print the verdict.
///
/// Exits with status 1 when an endpoint cannot be resolved; reachability
/// itself never changes the exit status.
async fn run_connection(
    k8s: &K8sClient,
    engine: &ConnectivityEngine,
    action: &ConnectionAction,
    verbose: bool,
) {
    let resolved = match action {
        ConnectionAction::PodToSvc {
            pod,
            service,
            pod_ns,
            svc_ns,
            svc_port,
        } => endpoints(
            k8s.pod_endpoint(pod, pod_ns).await,
            k8s.service_endpoint(service, svc_ns).await,
            pod,
            service,
            *svc_port,
        ),
        ConnectionAction::PodToPod {
            pod,
            target,
            pod_ns,
            target_ns,
            target_port,
        } => endpoints(
            k8s.pod_endpoint(pod, pod_ns).await,
            k8s.pod_endpoint(target, target_ns).await,
            pod,
            target,
            *target_port,
        ),
        ConnectionAction::PodToExt {
            pod,
            url,
            pod_ns,
            ext_port,
        } => endpoints(
            k8s.pod_endpoint(pod, pod_ns).await,
            Ok(Endpoint::external(url.clone())),
            pod,
            url,
            *ext_port,
        ),
    };

    let (source, target, pod_name, target_name, port) = match resolved {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = tokio::select! {
        result = engine.test_connectivity(&source, &target, Some(port)) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted");
            std::process::exit(130);
        }
    };

    match result {
        Ok(result) => {
            debug!(attempts = result.attempts.len(), "Connectivity test done");
            if verbose {
                print_attempts(&result);
            }
            if result.reachable {
                println!("Pod {} can connect to {}", pod_name, target_name);
            } else {
                println!("Pod {} cannot connect to {}", pod_name, target_name);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

type Resolved<'a> = (Endpoint, Endpoint, &'a str, &'a str, u16);

fn endpoints<'a>(
    source: Result<Endpoint, AppError>,
    target: Result<Endpoint, AppError>,
    pod_name: &'a str,
    target_name: &'a str,
    port: u16,
) -> Result<Resolved<'a>, AppError> {
    Ok((source?, target?, pod_name, target_name, port))
}

fn print_attempts(result: &ConnectivityResult) {
    match result.address.port {
        Some(port) => println!("Target address: {} (port {})", result.address.address, port),
        None => println!("Target address: {}", result.address.address),
    }
    for attempt in &result.attempts {
        match &attempt.failure {
            None => println!("  [ok]   {}", attempt.command),
            Some(reason) => println!("  [fail] {} ({})", attempt.command, reason),
        }
    }
    if !result.skipped.is_empty() {
        println!("  skipped, no port given: {}", result.skipped.join(", "));
    }
}
