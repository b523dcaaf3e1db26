//! Engine document - the serialized form of a stack
//!
//! The layout follows the engine's JSON syntax: resources are keyed by
//! engine type and then by logical name, with top-level `terraform`,
//! `provider`, `variable` and `output` blocks.

use crate::error::{Error, Result};
use crate::types::{Address, Backend, ResourceKind};
use crate::value::{Reference, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Version pin for a provider plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRequirement {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Engine settings block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerraformBlock {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub required_providers: BTreeMap<String, ProviderRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
}

/// Declared input variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableBlock {
    #[serde(rename = "type", default = "default_variable_type")]
    pub var_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
}

fn default_variable_type() -> String {
    "string".to_string()
}

/// Body of one resource: its properties plus explicit ordering edges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBody {
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// Externally visible value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBlock {
    pub value: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
}

/// A complete, validated stack in engine schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub terraform: TerraformBlock,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variable: BTreeMap<String, VariableBlock>,
    #[serde(default)]
    pub resource: BTreeMap<String, BTreeMap<String, ResourceBody>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output: BTreeMap<String, OutputBlock>,
}

impl Document {
    /// Serialize as pretty-printed JSON with a trailing newline
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Parse a document, checking that every resource type is known
    pub fn from_json(content: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(content)?;
        for engine_type in doc.resource.keys() {
            engine_type
                .parse::<ResourceKind>()
                .map_err(|_| Error::Parse(format!("unsupported resource type '{engine_type}'")))?;
        }
        Ok(doc)
    }

    /// Iterate over every resource as (address, body)
    pub fn resources(&self) -> impl Iterator<Item = (Address, &ResourceBody)> + '_ {
        self.resource.iter().flat_map(|(engine_type, by_name)| {
            by_name.iter().filter_map(move |(name, body)| {
                let kind = engine_type.parse::<ResourceKind>().ok()?;
                Some((Address::new(kind, name), body))
            })
        })
    }

    /// Look up a single resource body
    pub fn get(&self, address: &Address) -> Option<&ResourceBody> {
        self.resource
            .get(address.kind.engine_type())?
            .get(&address.name)
    }

    /// Number of declared resources
    pub fn resource_count(&self) -> usize {
        self.resource.values().map(BTreeMap::len).sum()
    }

    /// Dependency edges (from, to): `from` needs `to` to exist first.
    /// Includes both property references and explicit `depends_on`.
    pub fn edges(&self) -> Result<BTreeSet<(Address, Address)>> {
        let mut edges = BTreeSet::new();
        for (from, body) in self.resources() {
            for value in body.properties.values() {
                for reference in value.references() {
                    edges.insert((from.clone(), reference.address.clone()));
                }
            }
            for dep in &body.depends_on {
                edges.insert((from.clone(), dep.parse()?));
            }
        }
        Ok(edges)
    }

    /// Every address referenced by a resource or an output
    pub fn references(&self) -> Result<BTreeSet<Address>> {
        let mut referenced: BTreeSet<Address> =
            self.edges()?.into_iter().map(|(_, to)| to).collect();
        referenced.extend(self.output.values().map(|o| o.value.address.clone()));
        Ok(referenced)
    }

    /// References that point at addresses missing from this document
    pub fn dangling_references(&self) -> Result<Vec<Address>> {
        Ok(self
            .references()?
            .into_iter()
            .filter(|addr| self.get(addr).is_none())
            .collect())
    }
}
