//! Desired resource builder.
//!
//! Expands a [`Topology`] into the flat node and link target collections the
//! diff engine works on. Link specs are still keyed by device name here;
//! they are resolved to remote node IDs only once the nodes exist.

use log::warn;

use crate::topology::Topology;

/// Resource kinds the platform can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Image-backed device created from raw QEMU properties.
    Qemu,
    /// Ethernet switch, created raw and started implicitly.
    Switch,
    /// Cloud node, created raw and started implicitly.
    Cloud,
    /// Instantiated from a platform-registered template.
    Template,
}

impl NodeKind {
    /// Tracked-address prefix for this kind (`kind.name` in the state store).
    #[must_use]
    pub fn resource_type(self) -> &'static str {
        match self {
            Self::Qemu => "gns3_qemu_node",
            Self::Switch => "gns3_switch",
            Self::Cloud => "gns3_cloud",
            Self::Template => "gns3_template",
        }
    }

    /// Map the platform's reported `node_type` back to a kind.
    #[must_use]
    pub fn from_node_type(node_type: &str) -> Self {
        match node_type {
            "qemu" => Self::Qemu,
            "ethernet_switch" => Self::Switch,
            "cloud" => Self::Cloud,
            _ => Self::Template,
        }
    }
}

/// Creation properties for a QEMU-backed device.
///
/// Adapter count, RAM and CPU are fixed lab-wide; only the image and MAC
/// come from the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QemuProperties {
    pub image: String,
    pub mac_address: String,
    pub adapters: u32,
    pub ram: u32,
    pub cpus: u32,
}

impl QemuProperties {
    fn new(image: String, mac_address: String) -> Self {
        Self {
            image,
            mac_address,
            adapters: 10,
            ram: 2048,
            cpus: 2,
        }
    }
}

/// One node the platform should end up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
    /// Set only for [`NodeKind::Qemu`].
    pub qemu: Option<QemuProperties>,
}

impl NodeSpec {
    /// Tracked address of this node in the state store.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}.{}", self.kind.resource_type(), self.name)
    }
}

/// One endpoint of a desired link, still keyed by device name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub device: String,
    pub adapter: u32,
    pub port: u32,
}

/// One link the platform should end up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    pub a: EndpointSpec,
    pub b: EndpointSpec,
}

/// Expand the topology into flat node and link target collections.
///
/// Invalid links (endpoint count != 2, empty endpoint name) are dropped with
/// a diagnostic rather than aborting the pass.
pub fn build_desired(topo: &Topology) -> (Vec<NodeSpec>, Vec<LinkSpec>) {
    let mut nodes = Vec::new();

    for r in &topo.network_device.routers {
        nodes.push(NodeSpec {
            name: r.name.clone(),
            kind: NodeKind::Qemu,
            qemu: Some(QemuProperties::new(r.image.clone(), r.mac_address.clone())),
        });
    }
    for s in &topo.switches {
        nodes.push(NodeSpec {
            name: s.name.clone(),
            kind: NodeKind::Switch,
            qemu: None,
        });
    }
    for c in &topo.clouds {
        nodes.push(NodeSpec {
            name: c.name.clone(),
            kind: NodeKind::Cloud,
            qemu: None,
        });
    }
    for srv in &topo.templates.servers {
        nodes.push(NodeSpec {
            name: srv.name.clone(),
            kind: NodeKind::Template,
            qemu: None,
        });
    }

    let mut links = Vec::new();
    for link in &topo.links {
        if link.endpoints.len() != 2 {
            warn!(
                "skipping link with {} endpoints (must be exactly 2)",
                link.endpoints.len()
            );
            continue;
        }
        if link.endpoints.iter().any(|ep| ep.name.is_empty()) {
            warn!(
                "skipping link {:?} <-> {:?}: missing endpoint name",
                link.endpoints[0].name, link.endpoints[1].name
            );
            continue;
        }
        let ep = |i: usize| EndpointSpec {
            device: link.endpoints[i].name.clone(),
            adapter: link.endpoints[i].adapter,
            port: link.endpoints[i].port,
        };
        links.push(LinkSpec { a: ep(0), b: ep(1) });
    }

    (nodes, links)
}
