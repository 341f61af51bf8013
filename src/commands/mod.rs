pub mod apply;
pub mod destroy;
pub mod init;
pub mod plan;
pub mod validate;
pub mod watch;

use anyhow::{Context as AnyhowContext, Result};
use log::{info, warn};

use crate::cli::TopologyArgs;
use crate::context::Context;
use crate::error::Error;
use crate::platform::PlatformClient;
use crate::runner;
use crate::topology::Topology;

/// Load and validate the topology, resolve the project, and assemble the
/// run context.
///
/// Server precedence: `--server` flag, then the topology's `server` field,
/// then the default local address. With `create_project` the project is
/// created when the platform does not know it yet; otherwise a missing
/// project is an error.
pub fn setup(args: &TopologyArgs, create_project: bool) -> Result<Context> {
    let topo = Topology::load(&args.config)?;
    topo.validate()?;

    if !runner::command_exists("terraform") {
        warn!("terraform not found on PATH, state tracking will fail until installed");
    }

    let server = args.server.clone().unwrap_or_else(|| topo.server_url());
    let client = PlatformClient::new(server.clone());

    let project_id = match client.lookup_project(&topo.project.name) {
        Ok(id) => id,
        Err(Error::ProjectNotFound(_)) if create_project => {
            info!("project {} not found, creating it", topo.project.name);
            client
                .create_project(&topo.project.name)
                .with_context(|| format!("creating project {}", topo.project.name))?
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Context::new(
        server,
        topo.project.name.clone(),
        project_id,
        args.config.clone(),
    ))
}
