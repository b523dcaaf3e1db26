//! The GCP stack: network, subnetwork, GKE cluster and a Cloud SQL
//! PostgreSQL instance with one database and one user.

use anyhow::{Context, Result};
use stackgraph::{OutputDeclaration, ResourceKind, StackGraph, Value};

use crate::config::{AuthorizedNetwork, Settings};

const GOOGLE_PROVIDER_SOURCE: &str = "hashicorp/google";

/// Declare the whole stack on a fresh graph
pub fn declare(settings: &Settings) -> Result<StackGraph> {
    let mut graph = StackGraph::new();
    declare_into(&mut graph, settings).context("Failed to declare stack")?;
    Ok(graph)
}

fn declare_into(graph: &mut StackGraph, settings: &Settings) -> stackgraph::Result<()> {
    let region = settings.stack.region.as_str();

    graph.require_provider(
        "google",
        GOOGLE_PROVIDER_SOURCE,
        settings.stack.provider_version.as_deref(),
    );
    graph.provider(
        "google",
        [("project", &settings.stack.project), ("region", &settings.stack.region)],
    );
    graph.backend(settings.backend());

    // VPC and subnet
    let vpc = graph.declare(
        ResourceKind::Network,
        "vpc",
        [
            ("name", Value::from(settings.prefixed("vpc"))),
            ("auto_create_subnetworks", false.into()),
        ],
    )?;
    let vpc_id = graph.reference(&vpc, "id")?;

    let subnet = graph.declare(
        ResourceKind::Subnetwork,
        "subnet",
        [
            ("name", Value::from(settings.prefixed("subnet"))),
            ("ip_cidr_range", (&settings.network.subnet_cidr).into()),
            ("network", vpc_id.clone().into()),
            ("region", region.into()),
            (
                "private_ip_google_access",
                settings.network.private_google_access.into(),
            ),
        ],
    )?;
    let subnet_id = graph.reference(&subnet, "id")?;

    // GKE
    let cluster_settings = &settings.cluster;
    let cluster = graph.declare(
        ResourceKind::ManagedCluster,
        "gke-cluster",
        [
            ("name", Value::from(settings.prefixed("gke-cluster"))),
            ("location", region.into()),
            ("network", vpc_id.clone().into()),
            ("subnetwork", subnet_id.clone().into()),
            (
                "initial_node_count",
                cluster_settings.initial_node_count.into(),
            ),
            (
                "node_config",
                Value::block([
                    ("machine_type", Value::from(&cluster_settings.machine_type)),
                    ("oauth_scopes", Value::list(&cluster_settings.oauth_scopes)),
                ]),
            ),
            ("ip_allocation_policy", Value::block::<String, Value, _>([])),
            (
                "private_cluster_config",
                Value::block([
                    ("enable_private_nodes", Value::from(cluster_settings.private_nodes)),
                    (
                        "enable_private_endpoint",
                        cluster_settings.private_endpoint.into(),
                    ),
                    (
                        "master_ipv4_cidr_block",
                        (&cluster_settings.master_cidr).into(),
                    ),
                ]),
            ),
            (
                "master_authorized_networks_config",
                Value::block([(
                    "cidr_blocks",
                    cidr_blocks(&cluster_settings.authorized_networks),
                )]),
            ),
        ],
    )?;

    // PostgreSQL instance
    let db = &settings.database;
    let sql_instance = graph.declare(
        ResourceKind::DatabaseInstance,
        "sql-instance",
        [
            ("name", Value::from(settings.prefixed("sql-instance"))),
            ("database_version", (&db.version).into()),
            ("region", region.into()),
            (
                "settings",
                Value::block([
                    ("tier", Value::from(&db.tier)),
                    (
                        "ip_configuration",
                        Value::block([
                            ("private_network", Value::from(vpc_id.clone())),
                            (
                                "authorized_networks",
                                sql_authorized_networks(&db.authorized_networks),
                            ),
                        ]),
                    ),
                ]),
            ),
        ],
    )?;
    let instance_name = graph.reference(&sql_instance, "name")?;

    // PostgreSQL db
    let sql_db = graph.declare(
        ResourceKind::Database,
        "sql-db",
        [
            ("name", Value::from(settings.prefixed("sql-db"))),
            ("instance", instance_name.clone().into()),
        ],
    )?;

    // PostgreSQL user; the password is supplied to the engine at apply time
    let password = graph.secret(
        &db.password_variable,
        "Password for the database user, injected at apply time",
    )?;
    graph.declare(
        ResourceKind::DatabaseUser,
        &settings.prefixed("sql-user"),
        [
            ("name", Value::from(&db.user)),
            ("instance", instance_name.into()),
            ("password", password),
        ],
    )?;

    // Outputs
    let outputs = [
        (vpc_id, "vpc_id", "VPC ID"),
        (subnet_id, "subnet_id", "Subnet ID"),
        (graph.reference(&cluster, "name")?, "cluster_name", "GKE cluster name"),
        (
            graph.reference(&cluster, "master_version")?,
            "cluster_master_version",
            "GKE Kubernetes version",
        ),
        (
            graph.reference(&cluster, "endpoint")?,
            "cluster_endpoint",
            "GKE cluster endpoint",
        ),
        (
            graph.reference(&sql_instance, "connection_name")?,
            "database_connection_name",
            "SQL instance name",
        ),
        (
            graph.reference(&sql_db, "name")?,
            "database_name",
            "PostgreSQL database name",
        ),
        (
            graph.reference(&sql_instance, "first_ip_address")?,
            "sql_instance_ip",
            "PostgreSQL instance IP address",
        ),
        (
            graph.reference(&sql_instance, "self_link")?,
            "sql_instance_self_link",
            "SQL instance self link",
        ),
    ];
    for (reference, name, description) in outputs {
        graph.output(OutputDeclaration::new(name, reference).description(description))?;
    }

    Ok(())
}

fn cidr_blocks(networks: &[AuthorizedNetwork]) -> Value {
    Value::list(networks.iter().map(|n| {
        Value::block([
            ("cidr_block", Value::from(&n.cidr)),
            ("display_name", Value::from(&n.name)),
        ])
    }))
}

fn sql_authorized_networks(networks: &[AuthorizedNetwork]) -> Value {
    Value::list(networks.iter().map(|n| {
        Value::block([
            ("value", Value::from(&n.cidr)),
            ("name", Value::from(&n.name)),
        ])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgraph::{Address, Backend, Reference};

    fn address(kind: ResourceKind, name: &str) -> Address {
        Address::new(kind, name)
    }

    #[test]
    fn test_default_stack_builds() {
        let graph = declare(&Settings::default()).unwrap();
        let doc = graph.build().unwrap();

        assert_eq!(doc.resource_count(), 6);
        assert_eq!(doc.output.len(), 9);
        assert!(doc.dangling_references().unwrap().is_empty());
        assert_eq!(
            doc.provider["google"]["project"],
            Value::from("infra-tech-454706")
        );
        assert_eq!(
            doc.terraform.required_providers["google"].source,
            "hashicorp/google"
        );
    }

    #[test]
    fn test_subnet_references_vpc() {
        let doc = declare(&Settings::default()).unwrap().build().unwrap();
        let subnet = doc
            .get(&address(ResourceKind::Subnetwork, "subnet"))
            .unwrap();
        assert_eq!(
            subnet.properties["network"],
            Value::Reference(Reference {
                address: address(ResourceKind::Network, "vpc"),
                field: "id".into(),
            })
        );
        assert_eq!(subnet.properties["ip_cidr_range"], Value::from("10.0.0.0/16"));
    }

    #[test]
    fn test_password_is_never_literal() {
        let doc = declare(&Settings::default()).unwrap().build().unwrap();
        let user = doc
            .get(&address(ResourceKind::DatabaseUser, "infra-tech-sql-user"))
            .unwrap();
        assert_eq!(
            user.properties["password"],
            Value::Variable("db_password".into())
        );
        assert!(doc.variable["db_password"].sensitive);

        let json = doc.to_json_pretty().unwrap();
        assert!(json.contains("\"${var.db_password}\""));
    }

    #[test]
    fn test_cluster_nested_blocks() {
        let doc = declare(&Settings::default()).unwrap().build().unwrap();
        let cluster = doc
            .get(&address(ResourceKind::ManagedCluster, "gke-cluster"))
            .unwrap();
        let json = cluster.properties["master_authorized_networks_config"]
            .to_json()
            .unwrap();
        assert_eq!(json["cidr_blocks"].as_array().unwrap().len(), 3);
        assert_eq!(json["cidr_blocks"][0]["display_name"], "vpn-1");
        assert_eq!(
            cluster.properties["node_config"].to_json().unwrap()["machine_type"],
            "e2-small"
        );
    }

    #[test]
    fn test_apply_order() {
        let plan = declare(&Settings::default())
            .unwrap()
            .apply_order()
            .unwrap();
        let names: Vec<Vec<&str>> = plan
            .waves
            .iter()
            .map(|w| w.iter().map(|a| a.name.as_str()).collect())
            .collect();
        assert_eq!(
            names,
            vec![
                vec!["vpc"],
                vec!["subnet", "sql-instance"],
                vec!["gke-cluster", "sql-db", "infra-tech-sql-user"],
            ]
        );
    }

    #[test]
    fn test_local_backend_variant() {
        let mut settings = Settings::default();
        settings.backend.kind = crate::config::BackendKind::Local;
        let doc = declare(&settings).unwrap().build().unwrap();
        assert_eq!(
            doc.terraform.backend,
            Some(Backend::Local {
                path: "terraform.tfstate".into()
            })
        );
    }
}
