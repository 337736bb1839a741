use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;

use crate::probe::{ProbeCatalog, ProbeMode};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_kubeconfig")]
    pub kubeconfig: Option<String>,

    /// YAML probe catalog; the built-in catalog is used when unset
    #[serde(default)]
    pub catalog_path: Option<String>,

    #[serde(default)]
    pub probe_mode: ProbeMode,

    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Comma separated origins, `*` for any
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: String,
}

fn default_port() -> u16 {
    8080
}

fn default_kubeconfig() -> Option<String> {
    None
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_cors_allowed_origins() -> String {
    "*".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let settings: Config = config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid configuration, using defaults");
            Config::default()
        });

        Ok(settings)
    }

    /// Load the configured probe catalog, or the built-in one
    pub fn probe_catalog(&self) -> Result<Arc<ProbeCatalog>> {
        let catalog = match &self.catalog_path {
            Some(path) => ProbeCatalog::load(path)?,
            None => ProbeCatalog::default(),
        };
        Ok(Arc::new(catalog))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            kubeconfig: default_kubeconfig(),
            catalog_path: None,
            probe_mode: ProbeMode::default(),
            default_namespace: default_namespace(),
            cors_allowed_origins: default_cors_allowed_origins(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.probe_mode, ProbeMode::Fallback);
        assert_eq!(config.default_namespace, "default");
        assert_eq!(config.cors_allowed_origins, "*");
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_builtin_catalog_when_unset() {
        let catalog = Config::default().probe_catalog().unwrap();
        assert_eq!(*catalog, ProbeCatalog::default());
    }

    #[test]
    fn test_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "probes:\n  - tool: ping\n    args: \"-c 1 {{address}}\"").unwrap();

        let config = Config {
            catalog_path: Some(file.path().display().to_string()),
            ..Config::default()
        };
        let catalog = config.probe_catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.probes()[0].tool, "ping");
    }

    #[test]
    fn test_missing_catalog_file_errors() {
        let config = Config {
            catalog_path: Some("/nonexistent/catalog.yaml".to_string()),
            ..Config::default()
        };
        assert!(config.probe_catalog().is_err());
    }
}
