//! Resource graph builder
//!
//! Declarations are appended one at a time. A declaration can only
//! reference resources through handles returned by earlier `declare` calls
//! on the same builder, mirroring the order the engine will create things.
//! Edges added afterwards through [`StackGraph::set_property`] or
//! [`StackGraph::depends_on`] may close a cycle; [`StackGraph::build`]
//! rejects those before anything is serialized.

use crate::document::{
    Document, OutputBlock, ProviderRequirement, ResourceBody, TerraformBlock, VariableBlock,
};
use crate::error::{Error, Result};
use crate::planner::{self, ApplyPlan};
use crate::types::{Address, Backend, ResourceKind, is_valid_name};
use crate::value::{Reference, Value, is_valid_field};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Keys the engine reserves inside a resource body
const META_ARGUMENTS: [&str; 5] = ["depends_on", "count", "for_each", "provider", "lifecycle"];

/// Reject property names that would collide with engine meta-arguments
fn check_property_name(name: &str) -> Result<()> {
    if name.is_empty() || META_ARGUMENTS.contains(&name) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Token returned by [`StackGraph::declare`]; only valid on the graph that
/// issued it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    graph: u64,
    index: usize,
    address: Address,
}

impl ResourceHandle {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.address.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.address.kind
    }
}

/// Named output exposed after apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDeclaration {
    pub name: String,
    pub reference: Reference,
    pub description: Option<String>,
    pub sensitive: bool,
}

impl OutputDeclaration {
    pub fn new(name: impl Into<String>, reference: Reference) -> Self {
        Self {
            name: name.into(),
            reference,
            description: None,
            sensitive: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Redact the value in engine logs and UI
    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }
}

#[derive(Debug, Clone)]
struct Declaration {
    address: Address,
    properties: BTreeMap<String, Value>,
    depends_on: Vec<Address>,
}

/// Builder for one stack.
///
/// Each instance is an independent graph; nothing is shared between
/// builders, so several stacks can be assembled in one process.
#[derive(Debug)]
pub struct StackGraph {
    id: u64,
    resources: Vec<Declaration>,
    names: HashMap<String, usize>,
    outputs: Vec<OutputDeclaration>,
    variables: BTreeMap<String, VariableBlock>,
    providers: BTreeMap<String, BTreeMap<String, Value>>,
    required_providers: BTreeMap<String, ProviderRequirement>,
    backend: Option<Backend>,
}

impl StackGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            resources: Vec::new(),
            names: HashMap::new(),
            outputs: Vec::new(),
            variables: BTreeMap::new(),
            providers: BTreeMap::new(),
            required_providers: BTreeMap::new(),
            backend: None,
        }
    }

    /// Register a new resource.
    ///
    /// Logical names are unique across the whole graph regardless of kind.
    pub fn declare<K, V, I>(
        &mut self,
        kind: ResourceKind,
        name: &str,
        properties: I,
    ) -> Result<ResourceHandle>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        if !is_valid_name(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        if let Some(&existing) = self.names.get(name) {
            return Err(Error::DuplicateName {
                name: name.to_string(),
                existing: self.resources[existing].address.to_string(),
            });
        }

        let properties: BTreeMap<String, Value> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        for key in properties.keys() {
            check_property_name(key)?;
        }

        let address = Address::new(kind, name);
        let index = self.resources.len();
        log::debug!("declare {address}");

        self.resources.push(Declaration {
            address: address.clone(),
            properties,
            depends_on: Vec::new(),
        });
        self.names.insert(name.to_string(), index);

        Ok(ResourceHandle {
            graph: self.id,
            index,
            address,
        })
    }

    /// Placeholder for `field` of a declared resource
    pub fn reference(&self, handle: &ResourceHandle, field: &str) -> Result<Reference> {
        self.check_handle(handle)?;
        if !is_valid_field(field) {
            return Err(Error::InvalidName(field.to_string()));
        }
        Ok(Reference {
            address: handle.address.clone(),
            field: field.to_string(),
        })
    }

    /// Add or replace a property on a declared resource
    pub fn set_property(
        &mut self,
        handle: &ResourceHandle,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.check_handle(handle)?;
        let name = name.into();
        check_property_name(&name)?;
        self.resources[handle.index]
            .properties
            .insert(name, value.into());
        Ok(())
    }

    /// Add an explicit ordering edge: `handle` is created after `other`
    pub fn depends_on(&mut self, handle: &ResourceHandle, other: &ResourceHandle) -> Result<()> {
        self.check_handle(handle)?;
        self.check_handle(other)?;
        let deps = &mut self.resources[handle.index].depends_on;
        if !deps.contains(&other.address) {
            deps.push(other.address.clone());
        }
        Ok(())
    }

    /// Register a named output
    pub fn output(&mut self, output: OutputDeclaration) -> Result<()> {
        if !is_valid_name(&output.name) {
            return Err(Error::InvalidName(output.name));
        }
        if self.outputs.iter().any(|o| o.name == output.name) {
            return Err(Error::DuplicateOutput(output.name));
        }
        self.outputs.push(output);
        Ok(())
    }

    /// Declare a plain input variable and return its placeholder
    pub fn variable(&mut self, name: &str, description: &str) -> Result<Value> {
        self.add_variable(name, description, false)
    }

    /// Declare a sensitive input variable and return its placeholder.
    ///
    /// The engine injects the value at apply time (e.g. from
    /// `TF_VAR_<name>`), so the secret never appears in the document.
    pub fn secret(&mut self, name: &str, description: &str) -> Result<Value> {
        self.add_variable(name, description, true)
    }

    fn add_variable(&mut self, name: &str, description: &str, sensitive: bool) -> Result<Value> {
        if !is_valid_name(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        if self.variables.contains_key(name) {
            return Err(Error::DuplicateVariable(name.to_string()));
        }
        self.variables.insert(
            name.to_string(),
            VariableBlock {
                var_type: "string".to_string(),
                description: (!description.is_empty()).then(|| description.to_string()),
                sensitive,
            },
        );
        Ok(Value::Variable(name.to_string()))
    }

    /// Configure a provider block
    pub fn provider<K, V, I>(&mut self, name: &str, properties: I)
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.providers.insert(
            name.to_string(),
            properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
    }

    /// Pin a provider plugin source and version
    pub fn require_provider(&mut self, name: &str, source: &str, version: Option<&str>) {
        self.required_providers.insert(
            name.to_string(),
            ProviderRequirement {
                source: source.to_string(),
                version: version.map(str::to_string),
            },
        );
    }

    /// Select where the engine persists state
    pub fn backend(&mut self, backend: Backend) {
        self.backend = Some(backend);
    }

    /// Number of declared resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Declared resource addresses in declaration order
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.resources.iter().map(|r| &r.address)
    }

    pub fn outputs(&self) -> &[OutputDeclaration] {
        &self.outputs
    }

    /// Validate and serialize the graph. Either the whole document is
    /// produced or nothing is.
    pub fn build(&self) -> Result<Document> {
        self.validate()?;

        let mut resource: BTreeMap<String, BTreeMap<String, ResourceBody>> = BTreeMap::new();
        for decl in &self.resources {
            resource
                .entry(decl.address.kind.engine_type().to_string())
                .or_default()
                .insert(
                    decl.address.name.clone(),
                    ResourceBody {
                        properties: decl.properties.clone(),
                        depends_on: decl.depends_on.iter().map(ToString::to_string).collect(),
                    },
                );
        }

        let output = self
            .outputs
            .iter()
            .map(|o| {
                (
                    o.name.clone(),
                    OutputBlock {
                        value: o.reference.clone(),
                        description: o.description.clone(),
                        sensitive: o.sensitive,
                    },
                )
            })
            .collect();

        log::debug!(
            "built document: {} resources, {} outputs, {} variables",
            self.resources.len(),
            self.outputs.len(),
            self.variables.len()
        );

        Ok(Document {
            terraform: TerraformBlock {
                required_providers: self.required_providers.clone(),
                backend: self.backend.clone(),
            },
            provider: self.providers.clone(),
            variable: self.variables.clone(),
            resource,
            output,
        })
    }

    /// Validate the graph and group resources into creation waves
    pub fn apply_order(&self) -> Result<ApplyPlan> {
        let deps = self.validate()?;
        let waves = planner::layer(&deps)
            .into_iter()
            .map(|wave| {
                wave.into_iter()
                    .map(|i| self.resources[i].address.clone())
                    .collect()
            })
            .collect();
        Ok(ApplyPlan { waves })
    }

    /// Run every build-time check and return the resolved dependency lists
    fn validate(&self) -> Result<Vec<Vec<usize>>> {
        let deps = self.resolve_dependencies()?;
        self.check_variables()?;
        self.check_required_properties()?;

        if let Some(cycle) = planner::find_cycle(&deps) {
            return Err(Error::CyclicReference {
                cycle: cycle
                    .into_iter()
                    .map(|i| self.resources[i].address.to_string())
                    .collect(),
            });
        }
        Ok(deps)
    }

    fn resolve(&self, address: &Address) -> Result<usize> {
        self.names
            .get(&address.name)
            .copied()
            .filter(|&i| self.resources[i].address == *address)
            .ok_or_else(|| Error::UnknownResource(address.to_string()))
    }

    fn resolve_dependencies(&self) -> Result<Vec<Vec<usize>>> {
        let mut all = Vec::with_capacity(self.resources.len());
        for decl in &self.resources {
            let mut deps = Vec::new();
            let referenced = decl
                .properties
                .values()
                .flat_map(Value::references)
                .map(|r| &r.address)
                .chain(&decl.depends_on);
            for address in referenced {
                deps.push(self.resolve(address)?);
            }
            deps.sort_unstable();
            deps.dedup();
            log::trace!("{} depends on {:?}", decl.address, deps);
            all.push(deps);
        }

        for output in &self.outputs {
            self.resolve(&output.reference.address)?;
        }
        for properties in self.providers.values() {
            if let Some(r) = properties.values().flat_map(Value::references).next() {
                return Err(Error::UnknownResource(r.address.to_string()));
            }
        }
        Ok(all)
    }

    fn check_variables(&self) -> Result<()> {
        let values = self
            .resources
            .iter()
            .flat_map(|d| d.properties.values())
            .chain(self.providers.values().flat_map(BTreeMap::values));
        for value in values {
            if let Some(name) = value
                .variables()
                .into_iter()
                .find(|name| !self.variables.contains_key(*name))
            {
                return Err(Error::UnknownVariable(name.to_string()));
            }
        }
        Ok(())
    }

    fn check_required_properties(&self) -> Result<()> {
        for decl in &self.resources {
            for &property in decl.address.kind.required_properties() {
                if decl.properties.get(property).is_none_or(Value::is_null) {
                    return Err(Error::MissingProperty {
                        address: decl.address.to_string(),
                        property: property.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_handle(&self, handle: &ResourceHandle) -> Result<()> {
        let valid = handle.graph == self.id
            && self
                .resources
                .get(handle.index)
                .is_some_and(|r| r.address == handle.address);
        if valid {
            Ok(())
        } else {
            Err(Error::UnknownResource(handle.address.to_string()))
        }
    }
}

impl Default for StackGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_PROPS: [(&str, Value); 0] = [];

    fn network(graph: &mut StackGraph, name: &str) -> ResourceHandle {
        graph
            .declare(ResourceKind::Network, name, [("name", name)])
            .unwrap()
    }

    #[test]
    fn test_network_and_subnetwork() {
        let mut graph = StackGraph::new();
        let a = network(&mut graph, "a");
        let a_id = graph.reference(&a, "id").unwrap();
        graph
            .declare(
                ResourceKind::Subnetwork,
                "b",
                [
                    ("name", Value::from("b")),
                    ("ip_cidr_range", "10.0.0.0/16".into()),
                    ("network", a_id.clone().into()),
                ],
            )
            .unwrap();

        let doc = graph.build().unwrap();
        assert_eq!(doc.resource_count(), 2);
        let b = doc
            .get(&Address::new(ResourceKind::Subnetwork, "b"))
            .unwrap();
        assert_eq!(b.properties["network"], Value::Reference(a_id));
        assert_eq!(
            b.properties["network"].to_json().unwrap(),
            serde_json::json!("${google_compute_network.a.id}")
        );
    }

    #[test]
    fn test_duplicate_name_across_kinds() {
        let mut graph = StackGraph::new();
        network(&mut graph, "shared");
        let err = graph
            .declare(ResourceKind::Database, "shared", NO_PROPS)
            .unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateName {
                name: "shared".into(),
                existing: "google_compute_network.shared".into(),
            }
        );
    }

    #[test]
    fn test_invalid_name() {
        let mut graph = StackGraph::new();
        assert_eq!(
            graph.declare(ResourceKind::Network, "9lives", NO_PROPS),
            Err(Error::InvalidName("9lives".into()))
        );
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let mut first = StackGraph::new();
        let mut second = StackGraph::new();
        let foreign = network(&mut first, "vpc");
        network(&mut second, "vpc");

        assert_eq!(
            second.reference(&foreign, "id"),
            Err(Error::UnknownResource("google_compute_network.vpc".into()))
        );
        assert!(second.set_property(&foreign, "x", 1i64).is_err());
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let mut graph = StackGraph::new();
        let a = network(&mut graph, "a");
        let own = graph.reference(&a, "id").unwrap();
        graph.set_property(&a, "peer", own).unwrap();

        assert_eq!(
            graph.build(),
            Err(Error::CyclicReference {
                cycle: vec![
                    "google_compute_network.a".into(),
                    "google_compute_network.a".into()
                ],
            })
        );
    }

    #[test]
    fn test_depends_on_cycle() {
        let mut graph = StackGraph::new();
        let a = network(&mut graph, "a");
        let b = network(&mut graph, "b");
        let c = network(&mut graph, "c");
        graph.depends_on(&b, &a).unwrap();
        graph.depends_on(&c, &b).unwrap();
        assert!(graph.build().is_ok());

        graph.depends_on(&a, &c).unwrap();
        let err = graph.build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "cyclic reference: google_compute_network.a -> google_compute_network.c \
             -> google_compute_network.b -> google_compute_network.a"
        );
    }

    #[test]
    fn test_missing_required_property() {
        let mut graph = StackGraph::new();
        graph
            .declare(ResourceKind::DatabaseInstance, "db", [("name", "x")])
            .unwrap();
        assert_eq!(
            graph.build(),
            Err(Error::MissingProperty {
                address: "google_sql_database_instance.db".into(),
                property: "database_version".into(),
            })
        );
    }

    #[test]
    fn test_null_counts_as_missing() {
        let mut graph = StackGraph::new();
        graph
            .declare(ResourceKind::Network, "vpc", [("name", Value::Null)])
            .unwrap();
        assert!(matches!(graph.build(), Err(Error::MissingProperty { .. })));
    }

    #[test]
    fn test_reference_from_other_graph_in_properties() {
        let mut other = StackGraph::new();
        let ghost = network(&mut other, "ghost");
        let ghost_id = other.reference(&ghost, "id").unwrap();

        let mut graph = StackGraph::new();
        graph
            .declare(
                ResourceKind::Subnetwork,
                "subnet",
                [
                    ("name", Value::from("s")),
                    ("ip_cidr_range", "10.0.0.0/24".into()),
                    ("network", ghost_id.into()),
                ],
            )
            .unwrap();
        assert_eq!(
            graph.build(),
            Err(Error::UnknownResource("google_compute_network.ghost".into()))
        );
    }

    #[test]
    fn test_outputs_and_secrets() {
        let mut graph = StackGraph::new();
        let instance = graph
            .declare(
                ResourceKind::DatabaseInstance,
                "sql",
                [("name", "i"), ("database_version", "POSTGRES_14")],
            )
            .unwrap();
        let password = graph.secret("db_password", "Database password").unwrap();
        let instance_name = graph.reference(&instance, "name").unwrap();
        graph
            .declare(
                ResourceKind::DatabaseUser,
                "user",
                [
                    ("name", Value::from("app")),
                    ("instance", instance_name.into()),
                    ("password", password),
                ],
            )
            .unwrap();

        let conn = graph.reference(&instance, "connection_name").unwrap();
        graph
            .output(OutputDeclaration::new("conn", conn.clone()).description("Connection"))
            .unwrap();
        assert_eq!(
            graph.output(OutputDeclaration::new("conn", conn)),
            Err(Error::DuplicateOutput("conn".into()))
        );
        assert_eq!(
            graph.secret("db_password", ""),
            Err(Error::DuplicateVariable("db_password".into()))
        );

        let doc = graph.build().unwrap();
        assert!(doc.variable["db_password"].sensitive);
        assert_eq!(doc.output["conn"].description.as_deref(), Some("Connection"));
        assert!(!doc.output["conn"].sensitive);
    }

    #[test]
    fn test_sensitive_output_is_marked() {
        let mut graph = StackGraph::new();
        let vpc = network(&mut graph, "vpc");
        let id = graph.reference(&vpc, "id").unwrap();
        graph
            .output(OutputDeclaration::new("vpc_id", id).sensitive(true))
            .unwrap();

        let doc = graph.build().unwrap();
        assert!(doc.output["vpc_id"].sensitive);
        let json: serde_json::Value = serde_json::from_str(&doc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["output"]["vpc_id"]["sensitive"], serde_json::json!(true));
        assert_eq!(
            json["output"]["vpc_id"]["value"],
            serde_json::json!("${google_compute_network.vpc.id}")
        );
    }

    #[test]
    fn test_meta_argument_property_rejected() {
        let mut graph = StackGraph::new();
        let a = network(&mut graph, "a");
        let b = network(&mut graph, "b");

        assert_eq!(
            graph.set_property(&b, "depends_on", Value::list(["x"])),
            Err(Error::InvalidName("depends_on".into()))
        );
        assert_eq!(
            graph.declare(ResourceKind::Network, "c", [("name", "c"), ("count", "2")]),
            Err(Error::InvalidName("count".into()))
        );
        // A rejected declaration leaves no trace behind
        assert_eq!(graph.len(), 2);
        assert_eq!(network(&mut graph, "c").name(), "c");

        graph.depends_on(&b, &a).unwrap();
        let doc = graph.build().unwrap();
        let reparsed = Document::from_json(&doc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_interpolation_text_stays_literal() {
        let mut graph = StackGraph::new();
        graph
            .declare(
                ResourceKind::Subnetwork,
                "subnet",
                [
                    ("name", "s"),
                    ("ip_cidr_range", "10.0.0.0/24"),
                    ("network", "${google_compute_network.ghost.id}"),
                ],
            )
            .unwrap();

        let doc = graph.build().unwrap();
        let content = doc.to_json_pretty().unwrap();
        assert!(content.contains("$${google_compute_network.ghost.id}"));

        let reparsed = Document::from_json(&content).unwrap();
        assert!(reparsed.dangling_references().unwrap().is_empty());
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_undeclared_variable() {
        let mut graph = StackGraph::new();
        graph
            .declare(
                ResourceKind::Network,
                "vpc",
                [("name", Value::Variable("nope".into()))],
            )
            .unwrap();
        assert_eq!(graph.build(), Err(Error::UnknownVariable("nope".into())));
    }

    #[test]
    fn test_apply_order_waves() {
        let mut graph = StackGraph::new();
        let vpc = network(&mut graph, "vpc");
        let vpc_id = graph.reference(&vpc, "id").unwrap();
        let subnet = graph
            .declare(
                ResourceKind::Subnetwork,
                "subnet",
                [
                    ("name", Value::from("s")),
                    ("ip_cidr_range", "10.0.0.0/24".into()),
                    ("network", vpc_id.clone().into()),
                ],
            )
            .unwrap();
        let subnet_id = graph.reference(&subnet, "id").unwrap();
        graph
            .declare(
                ResourceKind::ManagedCluster,
                "gke",
                [
                    ("name", Value::from("c")),
                    ("location", "europe-north1".into()),
                    ("network", vpc_id.into()),
                    ("subnetwork", subnet_id.into()),
                ],
            )
            .unwrap();
        network(&mut graph, "unrelated");

        let plan = graph.apply_order().unwrap();
        let names: Vec<Vec<&str>> = plan
            .waves
            .iter()
            .map(|w| w.iter().map(|a| a.name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["vpc", "unrelated"], vec!["subnet"], vec!["gke"]]);
    }

    #[test]
    fn test_build_is_all_or_nothing() {
        let mut graph = StackGraph::new();
        network(&mut graph, "ok");
        graph
            .declare(ResourceKind::Database, "broken", [("name", "d")])
            .unwrap();
        assert!(graph.build().is_err());
        assert!(graph.apply_order().is_err());
    }
}
