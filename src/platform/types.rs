//! Wire types reported by the platform.

use serde::Deserialize;

/// Status string the platform reports for a running node.
pub const STATUS_STARTED: &str = "started";

/// A node as the platform currently reports it.
///
/// The platform may decorate node names with a disambiguating suffix, so
/// `name` is not guaranteed to equal the desired name it was created from.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservedNode {
    #[serde(rename = "node_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub node_type: String,
}

impl ObservedNode {
    /// Whether the platform reports this node as running.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.status == STATUS_STARTED
    }
}

/// A link as the platform currently reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservedLink {
    #[serde(rename = "link_id", default)]
    pub id: String,
    #[serde(default)]
    pub nodes: Vec<ObservedEndpoint>,
}

/// One side of an observed link, keyed by remote node ID.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservedEndpoint {
    pub node_id: String,
    #[serde(default)]
    pub adapter_number: u32,
    #[serde(default)]
    pub port_number: u32,
}

/// A globally registered template.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateInfo {
    pub template_id: String,
    pub name: String,
}

/// A project as listed by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectInfo {
    pub project_id: String,
    pub name: String,
}
