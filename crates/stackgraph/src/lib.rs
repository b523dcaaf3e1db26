//! # Stackgraph
//!
//! A typed builder for infrastructure declarations.
//!
//! This crate assembles resource declarations and the references between
//! them into a directed acyclic graph, then serializes that graph into the
//! JSON schema an external provisioning engine reconciles. Creating,
//! diffing and destroying real infrastructure is the engine's job; this
//! crate only guarantees that what it hands over is complete and acyclic.
//!
//! ## Core Concepts
//!
//! - **StackGraph**: explicit builder; every declaration goes through it
//! - **ResourceHandle**: token for a declared resource, scoped to one graph
//! - **Reference**: placeholder for an attribute resolved at apply time
//! - **Document**: the validated, serialized stack
//! - **ApplyPlan**: resources grouped into dependency waves
//!
//! ## Example
//!
//! ```
//! use stackgraph::{OutputDeclaration, ResourceKind, StackGraph, Value};
//!
//! let mut graph = StackGraph::new();
//! let vpc = graph.declare(ResourceKind::Network, "vpc", [("name", "main-vpc")])?;
//! let vpc_id = graph.reference(&vpc, "id")?;
//!
//! graph.declare(
//!     ResourceKind::Subnetwork,
//!     "subnet",
//!     [
//!         ("name", Value::from("main-subnet")),
//!         ("ip_cidr_range", "10.0.0.0/16".into()),
//!         ("network", vpc_id.clone().into()),
//!     ],
//! )?;
//! graph.output(OutputDeclaration::new("vpc_id", vpc_id).description("VPC ID"))?;
//!
//! let doc = graph.build()?;
//! assert_eq!(doc.resource_count(), 2);
//! # Ok::<(), stackgraph::Error>(())
//! ```

pub mod diff;
pub mod document;
pub mod error;
pub mod graph;
pub mod planner;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use diff::{Change, DiffSummary, ResourceDiff, diff_documents};
pub use document::{
    Document, OutputBlock, ProviderRequirement, ResourceBody, TerraformBlock, VariableBlock,
};
pub use error::{Error, Result};
pub use graph::{OutputDeclaration, ResourceHandle, StackGraph};
pub use planner::ApplyPlan;
pub use types::{Address, Backend, ResourceKind};
pub use value::{Reference, Value};
