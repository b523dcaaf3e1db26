//! Core types for resource declarations

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of infrastructure object a declaration describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// VPC network
    Network,
    /// Subnetwork inside a network
    Subnetwork,
    /// Managed Kubernetes cluster
    ManagedCluster,
    /// Managed relational database instance
    DatabaseInstance,
    /// Database hosted on an instance
    Database,
    /// Login user on an instance
    DatabaseUser,
}

impl ResourceKind {
    /// All supported kinds, in a stable order
    pub const ALL: [ResourceKind; 6] = [
        Self::Network,
        Self::Subnetwork,
        Self::ManagedCluster,
        Self::DatabaseInstance,
        Self::Database,
        Self::DatabaseUser,
    ];

    /// Short alias used in config and CLI output
    pub fn alias(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Subnetwork => "subnetwork",
            Self::ManagedCluster => "managed-cluster",
            Self::DatabaseInstance => "database-instance",
            Self::Database => "database",
            Self::DatabaseUser => "database-user",
        }
    }

    /// Resource type name in the engine schema
    pub fn engine_type(&self) -> &'static str {
        match self {
            Self::Network => "google_compute_network",
            Self::Subnetwork => "google_compute_subnetwork",
            Self::ManagedCluster => "google_container_cluster",
            Self::DatabaseInstance => "google_sql_database_instance",
            Self::Database => "google_sql_database",
            Self::DatabaseUser => "google_sql_user",
        }
    }

    /// Properties that must be present (and non-null) before the
    /// graph will serialize
    pub fn required_properties(&self) -> &'static [&'static str] {
        match self {
            Self::Network => &["name"],
            Self::Subnetwork => &["name", "ip_cidr_range", "network"],
            Self::ManagedCluster => &["name", "location"],
            Self::DatabaseInstance => &["name", "database_version"],
            Self::Database => &["name", "instance"],
            Self::DatabaseUser => &["name", "instance"],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    /// Accepts either the alias or the engine type name
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.alias() == s || kind.engine_type() == s)
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

/// Fully qualified location of a resource: kind plus logical name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub kind: ResourceKind,
    pub name: String,
}

impl Address {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind.engine_type(), self.name)
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Parse `<engine type>.<name>`
    fn from_str(s: &str) -> Result<Self> {
        let (kind, name) = s
            .split_once('.')
            .ok_or_else(|| Error::Parse(format!("malformed address '{s}'")))?;
        if !is_valid_name(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        Ok(Self::new(kind.parse()?, name))
    }
}

/// Where the engine persists reconciliation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Remote object storage bucket with a key prefix
    Gcs { bucket: String, prefix: String },
    /// State file on local disk
    Local { path: String },
}

impl Backend {
    /// Backend selector name as used in the engine schema
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gcs { .. } => "gcs",
            Self::Local { .. } => "local",
        }
    }

    /// Human-readable location of the state
    pub fn location(&self) -> String {
        match self {
            Self::Gcs { bucket, prefix } => format!("gs://{bucket}/{prefix}"),
            Self::Local { path } => path.clone(),
        }
    }
}

/// Check that a logical name is usable as an engine identifier
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
