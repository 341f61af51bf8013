//! Diff computation for nodes and links.
//!
//! Pure set reconciliation over two independently sourced collections: the
//! desired specs built from the topology file and the live state reported
//! by the platform. No I/O happens here.
//!
//! Node matching order:
//! 1. Remote-ID correlation recorded when a create call returned.
//! 2. Decorated-name match: the observed name equals the desired name, or
//!    extends it with a suffix that starts with a non-alphanumeric
//!    separator. `R1-7f3a` matches desired `R1`; `R10` does not.

use std::collections::{HashMap, HashSet};

use crate::desired::{LinkSpec, NodeSpec};
use crate::platform::types::{ObservedLink, ObservedNode};

/// Node-set reconciliation result.
#[derive(Debug, Default, Clone)]
pub struct NodeDiff {
    /// Desired nodes with no live counterpart.
    pub to_add: Vec<NodeSpec>,
    /// Live nodes no desired node claims.
    pub to_del: Vec<ObservedNode>,
}

impl NodeDiff {
    /// Whether the node sets already converge.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_del.is_empty()
    }
}

/// Link-set reconciliation result.
#[derive(Debug, Default, Clone)]
pub struct LinkDiff {
    pub to_add: Vec<ResolvedLink>,
    pub to_del: Vec<ObservedLink>,
}

impl LinkDiff {
    /// Whether the link sets already converge.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_del.is_empty()
    }
}

/// A desired link endpoint resolved to a remote node ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// Device name from the topology, kept for state addresses and logs.
    pub device: String,
    pub node_id: String,
    pub adapter: u32,
    pub port: u32,
}

/// A desired link with both endpoints resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub a: ResolvedEndpoint,
    pub b: ResolvedEndpoint,
}

impl ResolvedLink {
    /// Unordered identity of this link: the sorted remote-ID pair, so
    /// `(A,B)` and `(B,A)` collide.
    #[must_use]
    pub fn pair_key(&self) -> (String, String) {
        pair_key(&self.a.node_id, &self.b.node_id)
    }

    /// Tracked-address name for this link in the state store.
    #[must_use]
    pub fn tf_name(&self) -> String {
        format!("{}_to_{}", self.a.device, self.b.device)
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Whether an observed node name matches a desired logical name.
///
/// The platform may append a disambiguating suffix to the name it was
/// given; requiring a non-alphanumeric separator keeps `R1` from matching
/// an observed `R10`.
#[must_use]
pub fn name_matches(desired: &str, observed: &str) -> bool {
    if desired.is_empty() {
        return false;
    }
    if observed == desired {
        return true;
    }
    observed
        .strip_prefix(desired)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| !c.is_alphanumeric())
}

/// Compute the node create/delete sets.
///
/// `correlated` maps desired names to the remote IDs recorded when earlier
/// create calls returned; it is consulted before name matching and may be
/// empty (e.g. right after a process restart).
#[must_use]
pub fn diff_nodes(
    desired: &[NodeSpec],
    observed: &[ObservedNode],
    correlated: &HashMap<String, String>,
) -> NodeDiff {
    let mut diff = NodeDiff::default();
    let mut claimed: HashSet<&str> = HashSet::new();

    for spec in desired {
        let by_id = correlated.get(&spec.name).and_then(|id| {
            observed
                .iter()
                .find(|o| o.id == *id && !claimed.contains(o.id.as_str()))
        });
        let matched = by_id.or_else(|| {
            observed
                .iter()
                .find(|o| name_matches(&spec.name, &o.name) && !claimed.contains(o.id.as_str()))
        });
        match matched {
            Some(node) => {
                claimed.insert(node.id.as_str());
            }
            None => diff.to_add.push(spec.clone()),
        }
    }

    for node in observed {
        let wanted = desired.iter().any(|spec| {
            correlated.get(&spec.name) == Some(&node.id) || name_matches(&spec.name, &node.name)
        });
        if !wanted {
            diff.to_del.push(node.clone());
        }
    }

    diff
}

/// Compute the link create/delete sets over unordered remote-ID pairs.
///
/// Observed links without exactly two endpoints are ignored entirely.
#[must_use]
pub fn diff_links(desired: &[ResolvedLink], observed: &[ObservedLink]) -> LinkDiff {
    let mut diff = LinkDiff::default();

    let mut observed_pairs: HashMap<(String, String), &ObservedLink> = HashMap::new();
    for link in observed {
        if let [a, b] = link.nodes.as_slice() {
            observed_pairs.insert(pair_key(&a.node_id, &b.node_id), link);
        }
    }

    let desired_pairs: HashSet<(String, String)> =
        desired.iter().map(ResolvedLink::pair_key).collect();

    for link in desired {
        if !observed_pairs.contains_key(&link.pair_key()) {
            diff.to_add.push(link.clone());
        }
    }
    for (key, link) in &observed_pairs {
        if !desired_pairs.contains(key) {
            diff.to_del.push((*link).clone());
        }
    }

    diff
}

/// Resolve desired link specs against a name-to-remote-ID map.
///
/// Links whose endpoint names cannot currently be resolved (device not yet
/// created) are excluded from this pass; they are picked up on the next
/// pass once the node exists.
#[must_use]
pub fn resolve_links(specs: &[LinkSpec], name_to_id: &HashMap<String, String>) -> Vec<ResolvedLink> {
    let mut resolved = Vec::new();
    for spec in specs {
        let a = name_to_id.get(&spec.a.device);
        let b = name_to_id.get(&spec.b.device);
        match (a, b) {
            (Some(a_id), Some(b_id)) => resolved.push(ResolvedLink {
                a: ResolvedEndpoint {
                    device: spec.a.device.clone(),
                    node_id: a_id.clone(),
                    adapter: spec.a.adapter,
                    port: spec.a.port,
                },
                b: ResolvedEndpoint {
                    device: spec.b.device.clone(),
                    node_id: b_id.clone(),
                    adapter: spec.b.adapter,
                    port: spec.b.port,
                },
            }),
            _ => log::debug!(
                "link {} <-> {} not yet resolvable, deferring to next pass",
                spec.a.device,
                spec.b.device
            ),
        }
    }
    resolved
}

/// Build a name-to-remote-ID map from observed nodes.
///
/// Each full observed name maps to its ID; a decorated name additionally
/// registers its undecorated logical name (the part before the last `-`)
/// unless a node already owns that exact name.
#[must_use]
pub fn build_name_to_id(observed: &[ObservedNode]) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(observed.len() * 2);
    for node in observed {
        map.insert(node.name.clone(), node.id.clone());
    }
    for node in observed {
        if let Some(idx) = node.name.rfind('-') {
            let prefix = &node.name[..idx];
            if !prefix.is_empty() && !map.contains_key(prefix) {
                map.insert(prefix.to_string(), node.id.clone());
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::{EndpointSpec, NodeKind};
    use crate::platform::types::ObservedEndpoint;

    fn spec(name: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            kind: NodeKind::Qemu,
            qemu: None,
        }
    }

    fn node(id: &str, name: &str, status: &str) -> ObservedNode {
        ObservedNode {
            id: id.to_string(),
            name: name.to_string(),
            status: status.to_string(),
            node_type: "qemu".to_string(),
        }
    }

    fn observed_link(id: &str, a: &str, b: &str) -> ObservedLink {
        ObservedLink {
            id: id.to_string(),
            nodes: vec![
                ObservedEndpoint {
                    node_id: a.to_string(),
                    adapter_number: 0,
                    port_number: 0,
                },
                ObservedEndpoint {
                    node_id: b.to_string(),
                    adapter_number: 0,
                    port_number: 0,
                },
            ],
        }
    }

    fn resolved(a_dev: &str, a_id: &str, b_dev: &str, b_id: &str) -> ResolvedLink {
        ResolvedLink {
            a: ResolvedEndpoint {
                device: a_dev.to_string(),
                node_id: a_id.to_string(),
                adapter: 0,
                port: 0,
            },
            b: ResolvedEndpoint {
                device: b_dev.to_string(),
                node_id: b_id.to_string(),
                adapter: 0,
                port: 0,
            },
        }
    }

    fn no_ids() -> HashMap<String, String> {
        HashMap::new()
    }

    // ---- name matching ------------------------------------------------

    #[test]
    fn decorated_name_matches_desired() {
        assert!(name_matches("R1", "R1-7f3a"));
        assert!(name_matches("R1", "R1"));
    }

    #[test]
    fn unrelated_name_does_not_match() {
        assert!(!name_matches("R1", "SW1-001"));
    }

    #[test]
    fn longer_desired_name_is_not_claimed_by_its_prefix() {
        // R1 must never claim R10's instance.
        assert!(!name_matches("R1", "R10"));
        assert!(!name_matches("R1", "R10-abc"));
        assert!(name_matches("R10", "R10-abc"));
    }

    #[test]
    fn empty_desired_name_matches_nothing() {
        assert!(!name_matches("", "R1"));
    }

    // ---- node diff ----------------------------------------------------

    #[test]
    fn empty_platform_adds_everything() {
        let desired = vec![spec("R1"), spec("R2")];
        let diff = diff_nodes(&desired, &[], &no_ids());
        assert_eq!(diff.to_add.len(), 2);
        assert!(diff.to_del.is_empty());
    }

    #[test]
    fn unclaimed_observed_node_is_deleted() {
        let desired = vec![spec("R1")];
        let observed = vec![node("x", "R1-aaa", "started"), node("y", "R9-bbb", "started")];
        let diff = diff_nodes(&desired, &observed, &no_ids());
        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_del.len(), 1);
        assert_eq!(diff.to_del[0].name, "R9-bbb");
    }

    #[test]
    fn node_diff_is_idempotent_when_converged() {
        let desired = vec![spec("R1"), spec("SW1")];
        let observed = vec![node("x", "R1-aaa", "started"), node("y", "SW1", "started")];
        let diff = diff_nodes(&desired, &observed, &no_ids());
        assert!(diff.is_empty());
    }

    #[test]
    fn deletion_is_independent_of_status() {
        let desired = vec![spec("R1")];
        let observed = vec![node("y", "R9", "stopped")];
        let diff = diff_nodes(&desired, &observed, &no_ids());
        assert_eq!(diff.to_del.len(), 1);
    }

    #[test]
    fn r1_and_r10_resolve_to_their_own_instances() {
        let desired = vec![spec("R1"), spec("R10")];
        let observed = vec![node("a", "R10-xyz", "started"), node("b", "R1-xyz", "started")];
        let diff = diff_nodes(&desired, &observed, &no_ids());
        assert!(diff.is_empty(), "got {diff:?}");
    }

    #[test]
    fn correlation_wins_over_name_matching() {
        // The platform renamed the node beyond recognition; the recorded
        // remote ID still claims it.
        let desired = vec![spec("R1")];
        let observed = vec![node("id-42", "weird-display-name", "started")];
        let ids = HashMap::from([("R1".to_string(), "id-42".to_string())]);
        let diff = diff_nodes(&desired, &observed, &ids);
        assert!(diff.is_empty());
    }

    #[test]
    fn stale_correlation_falls_back_to_name_matching() {
        let desired = vec![spec("R1")];
        let observed = vec![node("new-id", "R1-bbb", "started")];
        let ids = HashMap::from([("R1".to_string(), "gone-id".to_string())]);
        let diff = diff_nodes(&desired, &observed, &ids);
        assert!(diff.is_empty());
    }

    #[test]
    fn each_observed_node_is_claimed_once() {
        // Two desired R1/R1-alike names cannot share one observed node.
        let desired = vec![spec("R1"), spec("R1")];
        let observed = vec![node("x", "R1-aaa", "started")];
        let diff = diff_nodes(&desired, &observed, &no_ids());
        assert_eq!(diff.to_add.len(), 1);
    }

    // ---- link diff ----------------------------------------------------

    #[test]
    fn link_pair_is_unordered() {
        let desired = vec![resolved("R1", "x", "R2", "y")];
        let observed = vec![observed_link("l1", "y", "x")];
        let diff = diff_links(&desired, &observed);
        assert!(diff.is_empty());
    }

    #[test]
    fn missing_link_is_added() {
        let desired = vec![resolved("R1", "x", "R2", "y")];
        let diff = diff_links(&desired, &[]);
        assert_eq!(diff.to_add.len(), 1);
        assert!(diff.to_del.is_empty());
    }

    #[test]
    fn undesired_link_is_deleted() {
        let observed = vec![observed_link("l1", "x", "z")];
        let diff = diff_links(&[], &observed);
        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_del.len(), 1);
        assert_eq!(diff.to_del[0].id, "l1");
    }

    #[test]
    fn malformed_observed_link_is_ignored() {
        let mut link = observed_link("l1", "x", "y");
        link.nodes.pop();
        let diff = diff_links(&[], &[link]);
        assert!(diff.is_empty());
    }

    #[test]
    fn link_diff_is_idempotent_when_converged() {
        let desired = vec![resolved("R1", "x", "R2", "y"), resolved("R2", "y", "SW1", "z")];
        let observed = vec![observed_link("l1", "x", "y"), observed_link("l2", "z", "y")];
        let diff = diff_links(&desired, &observed);
        assert!(diff.is_empty());
    }

    // ---- resolution ---------------------------------------------------

    fn link_spec(a: &str, b: &str) -> LinkSpec {
        LinkSpec {
            a: EndpointSpec {
                device: a.to_string(),
                adapter: 0,
                port: 0,
            },
            b: EndpointSpec {
                device: b.to_string(),
                adapter: 0,
                port: 1,
            },
        }
    }

    #[test]
    fn unresolvable_endpoint_gates_the_link() {
        let specs = vec![link_spec("R1", "R2"), link_spec("R1", "R3")];
        let ids = HashMap::from([
            ("R1".to_string(), "x".to_string()),
            ("R2".to_string(), "y".to_string()),
        ]);
        let resolved = resolve_links(&specs, &ids);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].a.node_id, "x");
        assert_eq!(resolved[0].b.node_id, "y");
        assert_eq!(resolved[0].b.port, 1);
    }

    #[test]
    fn name_map_registers_decorated_and_logical_names() {
        let observed = vec![node("x", "R1-7f3a", "started"), node("y", "SW1", "started")];
        let map = build_name_to_id(&observed);
        assert_eq!(map.get("R1-7f3a"), Some(&"x".to_string()));
        assert_eq!(map.get("R1"), Some(&"x".to_string()));
        assert_eq!(map.get("SW1"), Some(&"y".to_string()));
    }

    #[test]
    fn name_map_prefers_exact_name_over_stripped_prefix() {
        // A real node named R1 owns the key even when R1-aaa also exists.
        let observed = vec![node("a", "R1-aaa", "started"), node("b", "R1", "started")];
        let map = build_name_to_id(&observed);
        assert_eq!(map.get("R1"), Some(&"b".to_string()));
    }

    #[test]
    fn tf_name_joins_device_names() {
        assert_eq!(resolved("R1", "x", "R2", "y").tf_name(), "R1_to_R2");
    }
}
