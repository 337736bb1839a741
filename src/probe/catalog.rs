//! Ordered catalog of diagnostic probes
//!
//! The catalog is plain data: the engine walks it in declared order and
//! stops at the first probe that confirms reachability. Operators can supply
//! their own catalog as YAML:
//!
//! ```yaml
//! probes:
//!   - tool: wget
//!     args: "--spider -q --timeout=1 {address}"
//!     append_port: true
//!   - tool: nc
//!     args: "-z -w 2 {address} {port}"
//!     port_required: true
//!   - tool: nslookup
//!     args: "{address}"
//! ```
//!
//! Placeholders are substituted shell-quoted, so templates must not quote
//! them again.

use std::borrow::Cow;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::endpoint::ResolvedAddress;

pub const ADDRESS_PLACEHOLDER: &str = "{address}";
pub const PORT_PLACEHOLDER: &str = "{port}";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("catalog has no probes")]
    Empty,

    #[error("probe #{index} ({tool}) is invalid: {reason}")]
    InvalidProbe {
        index: usize,
        tool: String,
        reason: String,
    },
}

/// One diagnostic tool invocation template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProbeDefinition {
    /// Executable run inside the source container
    pub tool: String,
    /// Argument template with `{address}` and `{port}` placeholders
    #[serde(default)]
    pub args: String,
    /// Skip this probe when no port was given
    #[serde(default)]
    pub port_required: bool,
    /// Substitute `address:port` for `{address}` when a port is given
    #[serde(default)]
    pub append_port: bool,
}

impl ProbeDefinition {
    pub fn new(tool: &str, args: &str, port_required: bool) -> Self {
        Self {
            tool: tool.to_string(),
            args: args.to_string(),
            port_required,
            append_port: false,
        }
    }

    /// Address-and-port tools such as `wget host:port`
    pub fn with_port_suffix(mut self) -> Self {
        self.append_port = true;
        self
    }

    /// Build the shell command for this probe, or `None` when the probe
    /// needs a port and the address carries none.
    ///
    /// Probes flagged `append_port` get `address:port` when a port is
    /// available; all others see the bare address.
    pub fn build_command(&self, target: &ResolvedAddress) -> Option<String> {
        if self.port_required && target.port.is_none() {
            return None;
        }

        let address = match target.port {
            Some(port) if self.append_port => format!("{}:{}", target.address, port),
            _ => target.address.clone(),
        };
        let address = shell_quote(&address);

        let mut args = self.args.replace(ADDRESS_PLACEHOLDER, &address);
        if let Some(port) = target.port {
            args = args.replace(PORT_PLACEHOLDER, &port.to_string());
        }
        if !self.args.contains(ADDRESS_PLACEHOLDER) {
            if !args.is_empty() {
                args.push(' ');
            }
            args.push_str(&address);
        }

        Some(format!("{} {}", self.tool, args.trim()))
    }

    fn validate(&self, index: usize) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidProbe {
            index,
            tool: self.tool.clone(),
            reason: reason.to_string(),
        };

        if self.tool.trim().is_empty() || self.tool.contains(char::is_whitespace) {
            return Err(invalid("tool must be a single non-empty word"));
        }
        let templates_port = self.args.contains(PORT_PLACEHOLDER);
        if self.port_required && !templates_port {
            return Err(invalid("port_required probes must use {port}"));
        }
        if templates_port && !self.port_required {
            return Err(invalid("{port} is only allowed when port_required is set"));
        }
        if self.append_port && self.port_required {
            return Err(invalid("append_port cannot be combined with {port}"));
        }
        Ok(())
    }
}

/// Quote a substituted value for `sh -c`.
///
/// `resolve` rejects NUL bytes, the only input shlex refuses to quote.
fn shell_quote(value: &str) -> String {
    shlex::try_quote(value)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| "''".to_string())
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    probes: Vec<ProbeDefinition>,
}

/// Immutable, ordered list of probes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProbeCatalog {
    probes: Vec<ProbeDefinition>,
}

impl ProbeCatalog {
    pub fn new(probes: Vec<ProbeDefinition>) -> Result<Self, CatalogError> {
        if probes.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (index, probe) in probes.iter().enumerate() {
            probe.validate(index)?;
        }
        Ok(Self { probes })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Self::new(file.probes)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_yaml_str(&raw)?;
        tracing::info!(path = %path.display(), probes = catalog.len(), "Loaded probe catalog");
        Ok(catalog)
    }

    /// Single `wget` probe, the behaviour of the first releases
    pub fn legacy() -> Self {
        Self {
            probes: vec![ProbeDefinition::new("wget", "--spider --timeout=1 {address}", false)],
        }
    }

    pub fn probes(&self) -> &[ProbeDefinition] {
        &self.probes
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeDefinition> {
        self.probes.iter()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl Default for ProbeCatalog {
    /// Fast HTTP probes first, then TCP port checks, then address-only
    /// diagnostics.
    fn default() -> Self {
        Self {
            probes: vec![
                ProbeDefinition::new("wget", "--spider -q --timeout=1 {address}", false)
                    .with_port_suffix(),
                ProbeDefinition::new("curl", "-s -o /dev/null --max-time 2 {address}", false)
                    .with_port_suffix(),
                ProbeDefinition::new("nc", "-z -v -w 2 {address} {port}", true),
                ProbeDefinition::new("telnet", "{address} {port} </dev/null", true),
                // nmap exits 0 for closed ports too; the grep carries the verdict
                ProbeDefinition::new("nmap", "-Pn -p {port} {address} | grep -q '/tcp open'", true),
                ProbeDefinition::new("ping", "-c 1 -W 2 {address}", false),
                ProbeDefinition::new("nslookup", "{address}", false),
            ],
        }
    }
}
