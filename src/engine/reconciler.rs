//! Single-pass reconciliation orchestration.
//!
//! A pass re-reads the desired-state file, observes the platform, computes
//! the diffs, actuates, and replays the change set into the state store.
//! Actuation failures are collected per resource rather than aborting the
//! pass; only observation and config failures abort.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::context::Context;
use crate::desired::{LinkSpec, NodeKind, NodeSpec, build_desired};
use crate::engine::differ::{
    LinkDiff, NodeDiff, ResolvedLink, build_name_to_id, diff_links, diff_nodes, name_matches,
    resolve_links,
};
use crate::error::Result;
use crate::platform::{ObservedNode, PlatformClient};
use crate::state::{LINK_TYPE, StateStore, TrackedResource};
use crate::topology::Topology;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct PassSummary {
    pub nodes_created: usize,
    pub nodes_deleted: usize,
    pub nodes_started: usize,
    pub links_created: usize,
    pub links_deleted: usize,
    /// Per-resource actuation failures, as (address, message) pairs.
    pub failures: Vec<(String, String)>,
}

impl PassSummary {
    /// Whether the pass changed anything on the platform.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.nodes_created + self.nodes_deleted + self.links_created + self.links_deleted > 0
    }

    /// Whether every actuation in the pass succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, address: impl Into<String>, err: &crate::error::Error) {
        self.failures.push((address.into(), err.to_string()));
    }
}

/// Drives repeated passes against one project.
///
/// The name-to-remote-ID correlation map recorded from create responses
/// lives here and survives across passes; it is rebuilt opportunistically
/// from observation after a restart.
pub struct Reconciler {
    ctx: Context,
    client: PlatformClient,
    store: StateStore,
    node_ids: HashMap<String, String>,
}

impl Reconciler {
    #[must_use]
    pub fn new(ctx: Context) -> Self {
        let client = PlatformClient::new(ctx.server.clone());
        let store = StateStore::new(ctx.state_dir.clone());
        Self {
            ctx,
            client,
            store,
            node_ids: HashMap::new(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Compute both diffs without actuating. Used by `plan`.
    pub fn plan(&self) -> Result<(NodeDiff, LinkDiff)> {
        let (_, node_specs, link_specs) = load_desired(&self.ctx.topology_path)?;

        let observed = self.client.fetch_nodes(&self.ctx.project_id)?;
        let node_diff = diff_nodes(&node_specs, &observed, &self.node_ids);

        let name_to_id = build_name_to_id(&observed);
        let resolved = resolve_links(&link_specs, &name_to_id);
        let observed_links = self.client.fetch_links(&self.ctx.project_id)?;
        let link_diff = diff_links(&resolved, &observed_links);

        Ok((node_diff, link_diff))
    }

    /// Run one full reconciliation pass.
    pub fn run_pass(&mut self) -> Result<PassSummary> {
        let (topo, node_specs, link_specs) = load_desired(&self.ctx.topology_path)?;

        let mut summary = PassSummary::default();

        // Node phase.
        let observed = self.client.fetch_nodes(&self.ctx.project_id)?;
        let node_diff = diff_nodes(&node_specs, &observed, &self.node_ids);

        let mut created: Vec<(NodeSpec, String)> = Vec::new();
        for spec in &node_diff.to_add {
            info!("creating node {}", spec.name);
            match self.client.create_node(spec, &self.ctx.project_id) {
                Ok(id) => {
                    self.node_ids.insert(spec.name.clone(), id.clone());
                    created.push((spec.clone(), id));
                }
                Err(e) => {
                    warn!("failed to create node {}: {e}", spec.name);
                    summary.fail(spec.address(), &e);
                }
            }
        }

        let mut deleted: Vec<TrackedResource> = Vec::new();
        for node in &node_diff.to_del {
            info!("deleting node {} ({})", node.name, node.id);
            match self.client.delete_node(&node.id, &self.ctx.project_id) {
                Ok(()) => {
                    // Untrack under the name the import used, which is the
                    // logical name whenever the correlation map still
                    // remembers this node.
                    let name = tracked_node_name(&self.node_ids, node);
                    self.node_ids.retain(|_, id| *id != node.id);
                    let kind = NodeKind::from_node_type(&node.node_type);
                    deleted.push(TrackedResource::new(kind.resource_type(), name, &node.id));
                }
                Err(e) => {
                    warn!("failed to delete node {}: {e}", node.name);
                    let kind = NodeKind::from_node_type(&node.node_type);
                    summary.fail(format!("{}.{}", kind.resource_type(), node.name), &e);
                }
            }
        }

        if topo.project.start_nodes {
            summary.nodes_started = self.start_stragglers(&node_specs, &observed, &mut summary.failures);
        }

        summary.nodes_created = created.len();
        summary.nodes_deleted = deleted.len();

        // Re-observe after mutations so link resolution sees the new nodes.
        let observed = if created.is_empty() && deleted.is_empty() {
            observed
        } else {
            self.client.fetch_nodes_retry(&self.ctx.project_id)?
        };
        self.refresh_correlation(&node_specs, &observed);

        // Link phase. Creation-recorded IDs take precedence over the
        // listing-derived undecorated names.
        let mut name_to_id = build_name_to_id(&observed);
        for (name, id) in &self.node_ids {
            name_to_id.insert(name.clone(), id.clone());
        }
        let resolved = resolve_links(&link_specs, &name_to_id);
        let observed_links = self.client.fetch_links(&self.ctx.project_id)?;
        let link_diff = diff_links(&resolved, &observed_links);

        let mut links_created: Vec<(ResolvedLink, String)> = Vec::new();
        for link in &link_diff.to_add {
            info!("creating link {}", link.tf_name());
            match self.client.create_link(link, &self.ctx.project_id) {
                Ok(id) => links_created.push((link.clone(), id)),
                Err(e) => {
                    warn!("failed to create link {}: {e}", link.tf_name());
                    summary.fail(format!("{LINK_TYPE}.{}", link.tf_name()), &e);
                }
            }
        }

        let id_to_name: HashMap<&str, &str> = observed
            .iter()
            .map(|n| (n.id.as_str(), n.name.as_str()))
            .collect();
        let mut links_deleted: Vec<TrackedResource> = Vec::new();
        for link in &link_diff.to_del {
            let name = observed_link_name(link, &id_to_name);
            info!("deleting link {name} ({})", link.id);
            match self.client.delete_link(&link.id, &self.ctx.project_id) {
                Ok(()) => links_deleted.push(TrackedResource::new(LINK_TYPE, name, &link.id)),
                Err(e) => {
                    warn!("failed to delete link {name}: {e}");
                    summary.fail(format!("{LINK_TYPE}.{name}"), &e);
                }
            }
        }

        summary.links_created = links_created.len();
        summary.links_deleted = links_deleted.len();

        // State phase: replay the applied delta into the store.
        let mut added: Vec<TrackedResource> = created
            .iter()
            .map(|(spec, id)| TrackedResource::new(spec.kind.resource_type(), &spec.name, id))
            .collect();
        added.extend(
            links_created
                .iter()
                .map(|(link, id)| TrackedResource::new(LINK_TYPE, link.tf_name(), id)),
        );

        let mut removed = deleted;
        removed.extend(links_deleted);

        if !added.is_empty() || !removed.is_empty() {
            self.store
                .sync_delta(&self.ctx.project_id, &added, &removed);
        }

        if summary.changed() {
            info!(
                "pass done: +{} -{} nodes, +{} -{} links, {} started, {} failures",
                summary.nodes_created,
                summary.nodes_deleted,
                summary.links_created,
                summary.links_deleted,
                summary.nodes_started,
                summary.failures.len()
            );
        } else {
            debug!("pass done: already converged");
        }

        Ok(summary)
    }

    /// Start desired nodes that exist but are not running. Freshly created
    /// nodes are started by their create call and are not in `observed`.
    fn start_stragglers(
        &self,
        desired: &[NodeSpec],
        observed: &[ObservedNode],
        failures: &mut Vec<(String, String)>,
    ) -> usize {
        let mut started = 0;
        for node in observed {
            if node.is_started() {
                continue;
            }
            let wanted = desired.iter().any(|spec| {
                self.node_ids.get(&spec.name) == Some(&node.id)
                    || name_matches(&spec.name, &node.name)
            });
            if !wanted {
                continue;
            }
            info!("starting node {} ({})", node.name, node.id);
            match self.client.start_node(&node.id, &self.ctx.project_id) {
                Ok(()) => started += 1,
                Err(e) => {
                    warn!("failed to start node {}: {e}", node.name);
                    let kind = NodeKind::from_node_type(&node.node_type);
                    failures.push((format!("{}.{}", kind.resource_type(), node.name), e.to_string()));
                }
            }
        }
        started
    }

    /// Drop correlation entries whose node vanished and fill gaps from the
    /// observed listing, so decorated names survive a process restart.
    fn refresh_correlation(&mut self, desired: &[NodeSpec], observed: &[ObservedNode]) {
        self.node_ids
            .retain(|_, id| observed.iter().any(|o| o.id == *id));
        for spec in desired {
            if self.node_ids.contains_key(&spec.name) {
                continue;
            }
            if let Some(node) = observed.iter().find(|o| name_matches(&spec.name, &o.name)) {
                self.node_ids.insert(spec.name.clone(), node.id.clone());
            }
        }
    }
}

/// Re-read the desired state for one pass.
///
/// Only parse and read failures abort a pass. Schema minimums (router,
/// server and link counts) are checked at startup and by `validate`; a
/// topology legitimately shrinks below them while converging toward
/// deletions.
fn load_desired(path: &std::path::Path) -> Result<(Topology, Vec<NodeSpec>, Vec<LinkSpec>)> {
    let topo = Topology::load(path)?;
    let (nodes, links) = build_desired(&topo);
    Ok((topo, nodes, links))
}

/// State-store name for a node being deleted: the logical name recorded at
/// creation time while the correlation map still holds it, else the
/// observed (possibly decorated) name.
fn tracked_node_name(node_ids: &HashMap<String, String>, node: &ObservedNode) -> String {
    node_ids
        .iter()
        .find(|(_, id)| **id == node.id)
        .map_or_else(|| node.name.clone(), |(name, _)| name.clone())
}

fn observed_link_name(
    link: &crate::platform::ObservedLink,
    id_to_name: &HashMap<&str, &str>,
) -> String {
    let end = |idx: usize| -> &str {
        link.nodes
            .get(idx)
            .map(|e| {
                id_to_name
                    .get(e.node_id.as_str())
                    .copied()
                    .unwrap_or(e.node_id.as_str())
            })
            .unwrap_or("unknown")
    };
    format!("{}_to_{}", end(0), end(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::types::{ObservedEndpoint, ObservedLink};

    fn node(id: &str, name: &str) -> ObservedNode {
        ObservedNode {
            id: id.to_string(),
            name: name.to_string(),
            status: "started".to_string(),
            node_type: "qemu".to_string(),
        }
    }

    #[test]
    fn pass_accepts_a_topology_below_schema_minimums() {
        // Emptying the file (bar one switch) must produce a desired set
        // that converges by deletion, not a validation abort.
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"project: { name: lab }\nswitches:\n  - name: SW1\n")
            .expect("write topology");

        let (_, nodes, links) = load_desired(file.path()).expect("pass loads it");
        assert_eq!(nodes.len(), 1);
        assert!(links.is_empty());
    }

    #[test]
    fn empty_summary_is_clean_and_unchanged() {
        let summary = PassSummary::default();
        assert!(summary.is_clean());
        assert!(!summary.changed());
    }

    #[test]
    fn summary_with_creations_reports_change() {
        let summary = PassSummary {
            links_created: 1,
            ..PassSummary::default()
        };
        assert!(summary.changed());
    }

    #[test]
    fn deletion_untracks_the_name_the_import_used() {
        // R9 was created under its logical name; the platform shows it
        // decorated. The state address must use the logical name.
        let ids = HashMap::from([("R9".to_string(), "id-9".to_string())]);
        let observed = node("id-9", "R9-7f3a");
        assert_eq!(tracked_node_name(&ids, &observed), "R9");
    }

    #[test]
    fn deletion_falls_back_to_the_observed_name() {
        let observed = node("id-9", "R9-7f3a");
        assert_eq!(tracked_node_name(&HashMap::new(), &observed), "R9-7f3a");
    }

    #[test]
    fn link_name_resolves_endpoint_ids() {
        let nodes = [node("n-1", "R1-aaaa"), node("n-2", "SW1")];
        let id_to_name: HashMap<&str, &str> =
            nodes.iter().map(|n| (n.id.as_str(), n.name.as_str())).collect();
        let link = ObservedLink {
            id: "l-1".to_string(),
            nodes: vec![
                ObservedEndpoint {
                    node_id: "n-1".to_string(),
                    adapter_number: 0,
                    port_number: 0,
                },
                ObservedEndpoint {
                    node_id: "n-2".to_string(),
                    adapter_number: 0,
                    port_number: 3,
                },
            ],
        };
        assert_eq!(observed_link_name(&link, &id_to_name), "R1-aaaa_to_SW1");
    }

    #[test]
    fn link_name_falls_back_to_raw_id() {
        let id_to_name = HashMap::new();
        let link = ObservedLink {
            id: "l-1".to_string(),
            nodes: vec![
                ObservedEndpoint {
                    node_id: "n-9".to_string(),
                    adapter_number: 0,
                    port_number: 0,
                },
                ObservedEndpoint {
                    node_id: "n-8".to_string(),
                    adapter_number: 0,
                    port_number: 0,
                },
            ],
        };
        assert_eq!(observed_link_name(&link, &id_to_name), "n-9_to_n-8");
    }
}
