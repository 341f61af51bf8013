//! Blocking HTTP client for the platform's REST API.
//!
//! Every call is a single synchronous request. Non-2xx responses become
//! [`Error::Api`] carrying the response body; the caller decides whether
//! that aborts the pass (listings) or only skips one resource (actuation).

use std::thread;
use std::time::Duration;

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::json;
use ureq::Agent;

use crate::desired::{NodeKind, NodeSpec};
use crate::engine::differ::ResolvedLink;
use crate::error::{Error, Result};
use crate::platform::types::{ObservedLink, ObservedNode, ProjectInfo, TemplateInfo};

/// Bounded retry used to absorb the platform's propagation delay between
/// node creation and its appearance in listings.
pub const FETCH_ATTEMPTS: u32 = 5;
/// Fixed delay between listing retries.
pub const FETCH_DELAY: Duration = Duration::from_secs(1);

/// Client for one platform instance.
pub struct PlatformClient {
    agent: Agent,
    base_url: String,
}

impl PlatformClient {
    /// Create a client for the given base address.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        // Non-2xx responses are inspected manually so the body can be
        // carried into the error.
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let mut resp = self.agent.get(self.url(path)).call()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.body_mut().read_to_string().unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        resp.body_mut()
            .read_json()
            .map_err(|e| Error::Transport(e.to_string()))
    }

    fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let mut resp = self.agent.post(self.url(path)).send_json(body)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.body_mut().read_to_string().unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        resp.body_mut()
            .read_json()
            .map_err(|e| Error::Transport(e.to_string()))
    }

    fn post_empty(&self, path: &str) -> Result<()> {
        let mut resp = self.agent.post(self.url(path)).send_empty()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.body_mut().read_to_string().unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let mut resp = self.agent.delete(self.url(path)).call()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.body_mut().read_to_string().unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    // ---- projects -----------------------------------------------------

    /// List all projects on the platform.
    pub fn list_projects(&self) -> Result<Vec<ProjectInfo>> {
        self.get_json("/v2/projects")
    }

    /// Resolve a project name to its remote ID.
    pub fn lookup_project(&self, name: &str) -> Result<String> {
        self.list_projects()?
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.project_id)
            .ok_or_else(|| Error::ProjectNotFound(name.to_string()))
    }

    /// Create a project, returning its remote ID.
    pub fn create_project(&self, name: &str) -> Result<String> {
        let resp = self.post_json("/v2/projects", &json!({ "name": name }))?;
        remote_id(&resp, "project_id").ok_or_else(|| Error::MissingRemoteId {
            resource: format!("project {name}"),
        })
    }

    // ---- observation --------------------------------------------------

    /// List the nodes currently in the project.
    pub fn fetch_nodes(&self, project_id: &str) -> Result<Vec<ObservedNode>> {
        self.get_json(&format!("/v2/projects/{project_id}/nodes"))
    }

    /// List nodes with bounded retry, requiring a non-empty listing.
    ///
    /// Used right after actuation: newly created nodes are not immediately
    /// visible, so each attempt waits [`FETCH_DELAY`] first.
    pub fn fetch_nodes_retry(&self, project_id: &str) -> Result<Vec<ObservedNode>> {
        let mut last_err = None;
        for attempt in 1..=FETCH_ATTEMPTS {
            thread::sleep(FETCH_DELAY);
            match self.fetch_nodes(project_id) {
                Ok(nodes) if !nodes.is_empty() => return Ok(nodes),
                Ok(_) => debug!("node listing empty on attempt {attempt}/{FETCH_ATTEMPTS}"),
                Err(e) => {
                    debug!("node fetch attempt {attempt}/{FETCH_ATTEMPTS} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(Error::EmptyListing {
            attempts: FETCH_ATTEMPTS,
        }))
    }

    /// List the links currently in the project.
    pub fn fetch_links(&self, project_id: &str) -> Result<Vec<ObservedLink>> {
        self.get_json(&format!("/v2/projects/{project_id}/links"))
    }

    /// List all globally registered templates.
    pub fn list_templates(&self) -> Result<Vec<TemplateInfo>> {
        self.get_json("/v2/templates")
    }

    // ---- actuation ----------------------------------------------------

    /// Create one node, dispatching on its kind. Returns the remote node ID.
    ///
    /// QEMU and template nodes are started as part of creation; switches and
    /// clouds start implicitly.
    pub fn create_node(&self, spec: &NodeSpec, project_id: &str) -> Result<String> {
        match spec.kind {
            NodeKind::Qemu => self.create_qemu_node(spec, project_id),
            NodeKind::Switch => self.create_raw_node(&spec.name, "ethernet_switch", project_id),
            NodeKind::Cloud => self.create_raw_node(&spec.name, "cloud", project_id),
            NodeKind::Template => self.create_template_node(&spec.name, project_id),
        }
    }

    fn create_raw_node(&self, name: &str, node_type: &str, project_id: &str) -> Result<String> {
        let body = json!({
            "name": name,
            "node_type": node_type,
            "compute_id": "local",
        });
        let resp = self.post_json(&format!("/v2/projects/{project_id}/nodes"), &body)?;
        remote_id(&resp, "node_id").ok_or_else(|| Error::MissingRemoteId {
            resource: name.to_string(),
        })
    }

    fn create_qemu_node(&self, spec: &NodeSpec, project_id: &str) -> Result<String> {
        let props = spec.qemu.as_ref().ok_or_else(|| Error::MissingRemoteId {
            resource: format!("{} (no qemu properties)", spec.name),
        })?;
        let body = json!({
            "name": spec.name,
            "node_type": "qemu",
            "compute_id": "local",
            "properties": {
                "adapter_type": "e1000",
                "adapters": props.adapters,
                "hda_disk_image": props.image,
                "mac_address": props.mac_address,
                "ram": props.ram,
                "cpus": props.cpus,
                "platform": "x86_64",
                "console_type": "telnet",
            },
        });
        let resp = self.post_json(&format!("/v2/projects/{project_id}/nodes"), &body)?;
        let node_id = remote_id(&resp, "node_id").ok_or_else(|| Error::MissingRemoteId {
            resource: spec.name.clone(),
        })?;
        // Both creation and start must succeed for the device to count as running.
        self.start_node(&node_id, project_id)?;
        Ok(node_id)
    }

    fn create_template_node(&self, name: &str, project_id: &str) -> Result<String> {
        let template_id = self
            .list_templates()?
            .into_iter()
            .find(|t| t.name == name)
            .map(|t| t.template_id)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;

        let body = json!({ "name": name, "x": 0, "y": 0 });
        let resp = self.post_json(
            &format!("/v2/projects/{project_id}/templates/{template_id}"),
            &body,
        )?;
        let node_id = remote_id(&resp, "node_id").ok_or_else(|| Error::MissingRemoteId {
            resource: name.to_string(),
        })?;
        self.start_node(&node_id, project_id)?;
        Ok(node_id)
    }

    /// Start a node.
    pub fn start_node(&self, node_id: &str, project_id: &str) -> Result<()> {
        self.post_empty(&format!("/v2/projects/{project_id}/nodes/{node_id}/start"))
    }

    /// Delete a node.
    pub fn delete_node(&self, node_id: &str, project_id: &str) -> Result<()> {
        self.delete(&format!("/v2/projects/{project_id}/nodes/{node_id}"))
    }

    /// Create a link between two resolved endpoints. Returns the remote link ID.
    pub fn create_link(&self, link: &ResolvedLink, project_id: &str) -> Result<String> {
        let body = json!({
            "nodes": [
                {
                    "node_id": link.a.node_id,
                    "adapter_number": link.a.adapter,
                    "port_number": link.a.port,
                },
                {
                    "node_id": link.b.node_id,
                    "adapter_number": link.b.adapter,
                    "port_number": link.b.port,
                },
            ],
        });
        let resp = self.post_json(&format!("/v2/projects/{project_id}/links"), &body)?;
        remote_id(&resp, "link_id").ok_or_else(|| Error::MissingRemoteId {
            resource: link.tf_name(),
        })
    }

    /// Delete a link.
    pub fn delete_link(&self, link_id: &str, project_id: &str) -> Result<()> {
        self.delete(&format!("/v2/projects/{project_id}/links/{link_id}"))
    }
}

/// Pull a remote ID out of a create response, tolerating the platform's
/// two field spellings.
fn remote_id(resp: &serde_json::Value, field: &str) -> Option<String> {
    for key in [field, "id"] {
        if let Some(id) = resp.get(key).and_then(|v| v.as_str())
            && !id.is_empty()
        {
            return Some(id.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_tolerates_trailing_slash() {
        let client = PlatformClient::new("http://localhost:3080/");
        assert_eq!(
            client.url("/v2/projects"),
            "http://localhost:3080/v2/projects"
        );
    }

    #[test]
    fn remote_id_prefers_the_named_field() {
        let resp = serde_json::json!({ "node_id": "abc", "id": "def" });
        assert_eq!(remote_id(&resp, "node_id").as_deref(), Some("abc"));
    }

    #[test]
    fn remote_id_falls_back_to_id() {
        let resp = serde_json::json!({ "id": "def" });
        assert_eq!(remote_id(&resp, "node_id").as_deref(), Some("def"));
    }

    #[test]
    fn remote_id_rejects_empty_values() {
        let resp = serde_json::json!({ "node_id": "" });
        assert_eq!(remote_id(&resp, "node_id"), None);
    }
}
