//! Structural diff between two documents

use crate::document::Document;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What happened to one entry between two documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Change {
    Added,
    Removed,
    /// Entry exists in both but the listed keys differ
    Modified { keys: Vec<String> },
}

/// A single difference, keyed by resource address or by the block path
/// (`terraform.backend`, `provider.<name>`, `variable.<name>`, `output.<name>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDiff {
    pub id: String,
    /// Engine type for resources, otherwise the top-level block name
    pub entry_type: String,
    pub change: Change,
}

impl ResourceDiff {
    pub fn is_addition(&self) -> bool {
        matches!(self.change, Change::Added)
    }

    pub fn is_removal(&self) -> bool {
        matches!(self.change, Change::Removed)
    }

    pub fn is_modification(&self) -> bool {
        matches!(self.change, Change::Modified { .. })
    }
}

/// Keys whose values differ between two maps, including keys only on one side
fn changed_keys<V: PartialEq>(old: &BTreeMap<String, V>, new: &BTreeMap<String, V>) -> Vec<String> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|k| old.get(*k) != new.get(*k))
        .cloned()
        .collect()
}

fn diff_entries<V, F>(
    entry_type: &str,
    id: F,
    old: Option<&BTreeMap<String, V>>,
    new: Option<&BTreeMap<String, V>>,
    out: &mut Vec<ResourceDiff>,
    keys_of: impl Fn(&V, &V) -> Vec<String>,
) where
    F: Fn(&str) -> String,
{
    let empty = BTreeMap::new();
    let old = old.unwrap_or(&empty);
    let new = new.unwrap_or(&empty);
    let names: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    for name in names {
        let change = match (old.get(name), new.get(name)) {
            (None, Some(_)) => Change::Added,
            (Some(_), None) => Change::Removed,
            (Some(a), Some(b)) => {
                let keys = keys_of(a, b);
                if keys.is_empty() {
                    continue;
                }
                Change::Modified { keys }
            }
            (None, None) => continue,
        };
        out.push(ResourceDiff {
            id: id(name.as_str()),
            entry_type: entry_type.to_string(),
            change,
        });
    }
}

/// Flag the fields of a struct-like entry whose values differ
fn fields(checks: &[(&str, bool)]) -> Vec<String> {
    checks
        .iter()
        .filter(|(_, differs)| *differs)
        .map(|(name, _)| (*name).to_string())
        .collect()
}

/// Engine settings, provider configuration and variables
fn diff_settings(old: &Document, new: &Document, diffs: &mut Vec<ResourceDiff>) {
    let backend = match (&old.terraform.backend, &new.terraform.backend) {
        (None, Some(_)) => Some(Change::Added),
        (Some(_), None) => Some(Change::Removed),
        (Some(a), Some(b)) if a != b => Some(Change::Modified {
            keys: fields(&[("type", a.kind() != b.kind()), ("location", a.location() != b.location())]),
        }),
        _ => None,
    };
    if let Some(change) = backend {
        diffs.push(ResourceDiff {
            id: "terraform.backend".to_string(),
            entry_type: "terraform".to_string(),
            change,
        });
    }

    diff_entries(
        "terraform",
        |name| format!("terraform.required_providers.{name}"),
        Some(&old.terraform.required_providers),
        Some(&new.terraform.required_providers),
        diffs,
        |a, b| fields(&[("source", a.source != b.source), ("version", a.version != b.version)]),
    );

    diff_entries(
        "provider",
        |name| format!("provider.{name}"),
        Some(&old.provider),
        Some(&new.provider),
        diffs,
        changed_keys,
    );

    diff_entries(
        "variable",
        |name| format!("variable.{name}"),
        Some(&old.variable),
        Some(&new.variable),
        diffs,
        |a, b| {
            fields(&[
                ("type", a.var_type != b.var_type),
                ("description", a.description != b.description),
                ("sensitive", a.sensitive != b.sensitive),
            ])
        },
    );
}

/// Compare two documents.
///
/// Returns only entries that differ: engine settings, providers and
/// variables first, then resources (grouped by engine type), then outputs.
pub fn diff_documents(old: &Document, new: &Document) -> Vec<ResourceDiff> {
    let mut diffs = Vec::new();
    diff_settings(old, new, &mut diffs);

    let types: BTreeSet<&String> = old.resource.keys().chain(new.resource.keys()).collect();
    for engine_type in types {
        diff_entries(
            engine_type,
            |name| format!("{engine_type}.{name}"),
            old.resource.get(engine_type),
            new.resource.get(engine_type),
            &mut diffs,
            |a, b| {
                let mut keys = changed_keys(&a.properties, &b.properties);
                if a.depends_on != b.depends_on {
                    keys.push("depends_on".to_string());
                }
                keys
            },
        );
    }

    diff_entries(
        "output",
        |name| format!("output.{name}"),
        Some(&old.output),
        Some(&new.output),
        &mut diffs,
        |a, b| {
            let mut keys = Vec::new();
            if a.value != b.value {
                keys.push("value".to_string());
            }
            if a.description != b.description {
                keys.push("description".to_string());
            }
            if a.sensitive != b.sensitive {
                keys.push("sensitive".to_string());
            }
            keys
        },
    );

    diffs
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of entries to add
    pub additions: usize,
    /// Number of entries to remove
    pub removals: usize,
    /// Number of entries to modify
    pub modifications: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.change {
                Change::Added => summary.additions += 1,
                Change::Removed => summary.removals += 1,
                Change::Modified { .. } => summary.modifications += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by entry type
pub fn group_by_type(diffs: &[ResourceDiff]) -> HashMap<String, Vec<&ResourceDiff>> {
    let mut groups: HashMap<String, Vec<&ResourceDiff>> = HashMap::new();
    for diff in diffs {
        groups.entry(diff.entry_type.clone()).or_default().push(diff);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        Document::from_json(&value.to_string()).unwrap()
    }

    #[test]
    fn test_identical_documents() {
        let a = doc(json!({
            "resource": { "google_compute_network": { "vpc": { "name": "n" } } }
        }));
        assert!(diff_documents(&a, &a.clone()).is_empty());
    }

    #[test]
    fn test_add_remove_modify() {
        let old = doc(json!({
            "resource": {
                "google_compute_network": { "vpc": { "name": "n", "mtu": 1460 } },
                "google_sql_database": { "db": { "name": "d", "instance": "i" } }
            },
            "output": { "vpc_id": { "value": "${google_compute_network.vpc.id}" } }
        }));
        let new = doc(json!({
            "resource": {
                "google_compute_network": { "vpc": { "name": "n2", "mtu": 1460 } },
                "google_sql_user": { "u": { "name": "app", "instance": "i" } }
            },
            "output": { "vpc_id": { "value": "${google_compute_network.vpc.id}", "sensitive": true } }
        }));

        let diffs = diff_documents(&old, &new);
        assert_eq!(
            diffs,
            vec![
                ResourceDiff {
                    id: "google_compute_network.vpc".into(),
                    entry_type: "google_compute_network".into(),
                    change: Change::Modified { keys: vec!["name".into()] },
                },
                ResourceDiff {
                    id: "google_sql_database.db".into(),
                    entry_type: "google_sql_database".into(),
                    change: Change::Removed,
                },
                ResourceDiff {
                    id: "google_sql_user.u".into(),
                    entry_type: "google_sql_user".into(),
                    change: Change::Added,
                },
                ResourceDiff {
                    id: "output.vpc_id".into(),
                    entry_type: "output".into(),
                    change: Change::Modified { keys: vec!["sensitive".into()] },
                },
            ]
        );

        let summary = DiffSummary::from_diffs(&diffs);
        assert_eq!(summary.additions, 1);
        assert_eq!(summary.removals, 1);
        assert_eq!(summary.modifications, 2);
        assert!(summary.has_changes());

        let groups = group_by_type(&diffs);
        assert_eq!(groups["output"].len(), 1);
        assert_eq!(groups.len(), 4);
    }

    #[test]
    fn test_settings_blocks_are_compared() {
        let old = doc(json!({
            "terraform": {
                "required_providers": { "google": { "source": "hashicorp/google" } },
                "backend": { "gcs": { "bucket": "b", "prefix": "p" } }
            },
            "provider": { "google": { "project": "p1", "region": "europe-north1" } },
            "variable": { "db_password": { "type": "string", "sensitive": true } }
        }));
        let new = doc(json!({
            "terraform": {
                "required_providers": { "google": { "source": "hashicorp/google" } },
                "backend": { "local": { "path": "terraform.tfstate" } }
            },
            "provider": { "google": { "project": "p2", "region": "europe-north1" } },
            "variable": {}
        }));

        let diffs = diff_documents(&old, &new);
        assert_eq!(
            diffs,
            vec![
                ResourceDiff {
                    id: "terraform.backend".into(),
                    entry_type: "terraform".into(),
                    change: Change::Modified {
                        keys: vec!["type".into(), "location".into()]
                    },
                },
                ResourceDiff {
                    id: "provider.google".into(),
                    entry_type: "provider".into(),
                    change: Change::Modified { keys: vec!["project".into()] },
                },
                ResourceDiff {
                    id: "variable.db_password".into(),
                    entry_type: "variable".into(),
                    change: Change::Removed,
                },
            ]
        );
        assert!(DiffSummary::from_diffs(&diffs).has_changes());
    }
}
