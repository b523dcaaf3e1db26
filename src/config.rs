//! Stack settings
//!
//! Settings resolve in layers: built-in defaults, then the optional
//! `stack.toml`, then environment variables and CLI flags (clap merges
//! those two before they reach [`Settings::apply_overrides`]).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stackgraph::Backend;
use std::path::Path;

use crate::cli::{BackendArg, StackArgs};
use crate::paths;

// ============================================================================
// Main Settings Schema
// ============================================================================

/// Everything the stack declaration needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub stack: StackSettings,

    #[serde(default)]
    pub network: NetworkSettings,

    #[serde(default)]
    pub cluster: ClusterSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub backend: BackendSettings,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// An explicit path must exist. Without one, the default config file is
    /// used if present and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                let path = paths::expand(&path.to_string_lossy());
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                path
            }
            None => {
                let path = paths::config_file()?;
                if !path.exists() {
                    log::debug!("No config at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };

        log::info!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format in stack config")
    }

    /// Serialize settings as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings")
    }

    /// Load, apply CLI/env overrides and validate in one step
    pub fn resolve(args: &StackArgs) -> Result<Self> {
        let mut settings = Self::load(args.config.as_deref())?;
        settings.apply_overrides(args);
        settings.validate()?;
        Ok(settings)
    }

    /// Apply values given on the command line or through the environment
    pub fn apply_overrides(&mut self, args: &StackArgs) {
        if let Some(project) = &args.project {
            self.stack.project.clone_from(project);
        }
        if let Some(region) = &args.region {
            self.stack.region.clone_from(region);
        }
        if let Some(backend) = args.backend {
            self.backend.kind = match backend {
                BackendArg::Gcs => BackendKind::Gcs,
                BackendArg::Local => BackendKind::Local,
            };
        }
        if let Some(bucket) = &args.state_bucket {
            self.backend.bucket = Some(bucket.clone());
        }
        if let Some(prefix) = &args.state_prefix {
            self.backend.prefix.clone_from(prefix);
        }
        if let Some(path) = &args.state_path {
            self.backend.path.clone_from(path);
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        self.stack.validate().context("Invalid [stack] settings")?;

        if self.network.subnet_cidr.is_empty() {
            anyhow::bail!("Subnet CIDR range cannot be empty");
        }

        self.cluster.validate().context("Invalid [cluster] settings")?;
        self.database
            .validate()
            .context("Invalid [database] settings")?;

        match self.backend.kind {
            BackendKind::Gcs => {
                if self.backend.bucket.as_deref() == Some("") {
                    anyhow::bail!("State bucket cannot be empty");
                }
            }
            BackendKind::Local => {
                if self.backend.path.is_empty() {
                    anyhow::bail!("Local state path cannot be empty");
                }
            }
        }

        Ok(())
    }

    /// Resolve a name from the shared prefix, e.g. `infra-tech-vpc`
    pub fn prefixed(&self, suffix: &str) -> String {
        format!("{}-{}", self.stack.prefix, suffix)
    }

    /// State backend for the engine
    pub fn backend(&self) -> Backend {
        match self.backend.kind {
            BackendKind::Gcs => Backend::Gcs {
                bucket: self
                    .backend
                    .bucket
                    .clone()
                    .unwrap_or_else(|| self.prefixed("tfstate")),
                prefix: self.backend.prefix.clone(),
            },
            BackendKind::Local => Backend::Local {
                path: self.backend.path.clone(),
            },
        }
    }
}

// ============================================================================
// Stack
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    /// Stack name, also the output sub-directory
    pub name: String,

    /// Cloud project identifier
    pub project: String,

    /// Region for every regional resource
    pub region: String,

    /// Prefix for cloud-side resource names
    pub prefix: String,

    /// Provider plugin version constraint
    pub provider_version: Option<String>,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            name: "gcp-stack".to_string(),
            project: "infra-tech-454706".to_string(),
            region: "europe-north1".to_string(),
            prefix: "infra-tech".to_string(),
            provider_version: None,
        }
    }
}

impl StackSettings {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("project", &self.project),
            ("region", &self.region),
            ("prefix", &self.prefix),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("Stack {field} cannot be empty");
            }
        }
        if self.name.contains(['/', '\\']) || self.name == "." || self.name == ".." {
            anyhow::bail!("Stack name '{}' must be a plain directory name", self.name);
        }
        Ok(())
    }
}

// ============================================================================
// Network
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Primary range of the subnetwork
    pub subnet_cidr: String,

    /// Let hosts without external IPs reach Google APIs
    pub private_google_access: bool,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            subnet_cidr: "10.0.0.0/16".to_string(),
            private_google_access: true,
        }
    }
}

/// A CIDR range allowed to reach an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedNetwork {
    pub cidr: String,
    pub name: String,
}

impl AuthorizedNetwork {
    fn new(cidr: &str, name: &str) -> Self {
        Self {
            cidr: cidr.to_string(),
            name: name.to_string(),
        }
    }
}

fn validate_networks(networks: &[AuthorizedNetwork]) -> Result<()> {
    for network in networks {
        if network.cidr.is_empty() {
            anyhow::bail!("Authorized network '{}' has an empty CIDR", network.name);
        }
    }
    Ok(())
}

// ============================================================================
// Cluster
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    pub machine_type: String,
    pub initial_node_count: u32,
    pub oauth_scopes: Vec<String>,
    pub private_nodes: bool,
    pub private_endpoint: bool,
    /// Range for the control plane's private endpoint
    pub master_cidr: String,
    /// Networks allowed to reach the control plane
    pub authorized_networks: Vec<AuthorizedNetwork>,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            machine_type: "e2-small".to_string(),
            initial_node_count: 1,
            oauth_scopes: vec!["https://www.googleapis.com/auth/cloud-platform".to_string()],
            private_nodes: true,
            private_endpoint: false,
            master_cidr: "172.16.0.0/28".to_string(),
            authorized_networks: vec![
                AuthorizedNetwork::new("10.26.32.12/32", "vpn-1"),
                AuthorizedNetwork::new("19.104.105.29/32", "vpn-2"),
                AuthorizedNetwork::new("0.0.0.0/0", "public-https"),
            ],
        }
    }
}

impl ClusterSettings {
    fn validate(&self) -> Result<()> {
        if self.machine_type.is_empty() {
            anyhow::bail!("Machine type cannot be empty");
        }
        if self.initial_node_count == 0 {
            anyhow::bail!("Initial node count must be at least 1");
        }
        validate_networks(&self.authorized_networks)
    }
}

// ============================================================================
// Database
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub version: String,
    pub tier: String,
    /// Login created on the instance
    pub user: String,
    /// Input variable carrying the user's password at apply time
    pub password_variable: String,
    pub authorized_networks: Vec<AuthorizedNetwork>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            version: "POSTGRES_14".to_string(),
            tier: "db-f1-micro".to_string(),
            user: "appuser".to_string(),
            password_variable: "db_password".to_string(),
            authorized_networks: vec![AuthorizedNetwork::new("0.0.0.0/0", "public-https")],
        }
    }
}

impl DatabaseSettings {
    fn validate(&self) -> Result<()> {
        if self.version.is_empty() || self.tier.is_empty() {
            anyhow::bail!("Database version and tier are required");
        }
        if self.user.is_empty() {
            anyhow::bail!("Database user cannot be empty");
        }
        if self.password_variable.is_empty() {
            anyhow::bail!("Password variable name cannot be empty");
        }
        validate_networks(&self.authorized_networks)
    }
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Gcs,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    #[serde(rename = "type")]
    pub kind: BackendKind,

    /// Bucket for remote state; defaults to `<prefix>-tfstate`
    pub bucket: Option<String>,

    /// Key prefix inside the bucket
    pub prefix: String,

    /// State file for the local backend
    pub path: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::Gcs,
            bucket: None,
            prefix: "terraform/state".to_string(),
            path: "terraform.tfstate".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
