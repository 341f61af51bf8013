//! `validate` - check a topology file without touching the platform.

use anyhow::Result;

use crate::cli::TopologyArgs;
use crate::error::Error;
use crate::topology::Topology;
use crate::ui;

pub fn run(args: &TopologyArgs) -> Result<()> {
    let topo = Topology::load(&args.config)?;

    match topo.validate() {
        Ok(()) => {
            ui::success(&format!("{} is valid", args.config.display()));
            ui::kv("project", &topo.project.name);
            ui::kv("routers", &topo.network_device.routers.len().to_string());
            ui::kv("switches", &topo.switches.len().to_string());
            ui::kv("clouds", &topo.clouds.len().to_string());
            ui::kv("servers", &topo.templates.servers.len().to_string());
            ui::kv("links", &topo.links.len().to_string());
            Ok(())
        }
        Err(Error::Validation(errs)) => {
            for e in &errs {
                ui::error(e);
            }
            anyhow::bail!("{} problem(s) in {}", errs.len(), args.config.display());
        }
        Err(e) => Err(e.into()),
    }
}
