//! Desired-state model and YAML loader.
//!
//! The topology file is the source of truth: it is re-read on every
//! reconciliation pass and never mutated in place. Parsing failures are
//! config errors that abort the pass, not the daemon.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Platform address used when the topology does not name one.
pub const DEFAULT_SERVER: &str = "http://localhost:3080";

/// Complete network topology as declared in the YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub project: Project,
    #[serde(default, rename = "network-device")]
    pub network_device: NetworkDevices,
    #[serde(default)]
    pub switches: Vec<Switch>,
    #[serde(default)]
    pub clouds: Vec<Cloud>,
    #[serde(default)]
    pub templates: Templates,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Project metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start_nodes: bool,
    /// Platform base address, e.g. `http://localhost:3080`.
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub terraform_version: Option<String>,
}

/// The `network-device` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkDevices {
    #[serde(default)]
    pub routers: Vec<NetworkDevice>,
}

/// A router backed by a disk image.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkDevice {
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub image: String,
    /// Vendor-specific configuration; opaque to the engine.
    #[serde(default)]
    pub config: serde_yaml::Value,
}

/// An ethernet switch.
#[derive(Debug, Clone, Deserialize)]
pub struct Switch {
    pub name: String,
}

/// A cloud node bridging out of the lab.
#[derive(Debug, Clone, Deserialize)]
pub struct Cloud {
    pub name: String,
}

/// The `templates` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Templates {
    #[serde(default)]
    pub servers: Vec<TemplateServer>,
}

/// A server instantiated from a platform-registered template.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateServer {
    pub name: String,
    #[serde(default)]
    pub start: bool,
    #[serde(default)]
    pub ztp_server: Option<String>,
}

/// A connection between two endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// A device interface: device name plus adapter and port numbers.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub adapter: u32,
    #[serde(default)]
    pub port: u32,
}

impl Topology {
    /// Read and parse the YAML topology file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_yaml::from_str(&data)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Platform base address: topology value or the default.
    pub fn server_url(&self) -> String {
        self.project
            .server
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER.to_string())
    }

    /// Walk the topology and accumulate every schema problem.
    pub fn validate(&self) -> Result<()> {
        let mut errs = Vec::new();
        let mac_re = mac_regex();

        if self.project.name.is_empty() {
            errs.push("project.name is required".to_string());
        }
        if self
            .project
            .terraform_version
            .as_deref()
            .unwrap_or_default()
            .is_empty()
        {
            errs.push("project.terraform_version is required".to_string());
        }

        if self.network_device.routers.is_empty() {
            errs.push("network-device.routers must contain at least one router".to_string());
        }
        for (i, r) in self.network_device.routers.iter().enumerate() {
            let p = format!("network-device.routers[{i}]");
            if r.name.is_empty() {
                errs.push(format!("{p}.name is required"));
            }
            if r.hostname.is_empty() {
                errs.push(format!("{p}.hostname is required"));
            }
            match r.vendor.to_lowercase().as_str() {
                "arista" | "cisco" | "juniper" => {}
                _ => errs.push(format!("{p}.vendor must be one of arista,cisco,juniper")),
            }
            if r.mac_address.is_empty() {
                errs.push(format!("{p}.mac_address is required"));
            } else if !mac_re.is_match(&r.mac_address) {
                errs.push(format!("{p}.mac_address is not a valid MAC address"));
            }
            if r.image.is_empty() {
                errs.push(format!("{p}.image is required"));
            }
            match r.config.as_sequence() {
                None => errs.push(format!("{p}.config is not an array")),
                Some(cfg) if cfg.is_empty() => {
                    errs.push(format!("{p}.config must have at least one entry"));
                }
                Some(_) => {}
            }
        }

        if self.templates.servers.is_empty() {
            errs.push("templates.servers must contain at least one entry".to_string());
        }
        for (i, srv) in self.templates.servers.iter().enumerate() {
            if srv.name.is_empty() {
                errs.push(format!("templates.servers[{i}].name is required"));
            }
        }

        if self.links.is_empty() {
            errs.push("links must contain at least one link".to_string());
        }
        for (i, link) in self.links.iter().enumerate() {
            if link.endpoints.len() != 2 {
                errs.push(format!(
                    "links[{i}].endpoints must have exactly two endpoints"
                ));
            }
            for (j, ep) in link.endpoints.iter().enumerate() {
                if ep.name.is_empty() {
                    errs.push(format!("links[{i}].endpoints[{j}].name is required"));
                }
            }
        }

        for (i, sw) in self.switches.iter().enumerate() {
            if sw.name.is_empty() {
                errs.push(format!("switches[{i}].name is required"));
            }
        }
        for (i, cl) in self.clouds.iter().enumerate() {
            if cl.name.is_empty() {
                errs.push(format!("clouds[{i}].name is required"));
            }
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errs))
        }
    }
}

fn mac_regex() -> Regex {
    // Six colon-separated hex octets.
    Regex::new("^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$").expect("static regex")
}
