//! `destroy` - tear down everything in the project.

use anyhow::Result;
use dialoguer::Confirm;
use log::warn;

use crate::cli::DestroyArgs;
use crate::platform::PlatformClient;
use crate::state::StateStore;
use crate::ui;

pub fn run(args: &DestroyArgs) -> Result<()> {
    let ctx = super::setup(&args.topology, false)?;
    let client = PlatformClient::new(ctx.server.clone());

    let nodes = client.fetch_nodes(&ctx.project_id)?;
    let links = client.fetch_links(&ctx.project_id)?;

    if nodes.is_empty() && links.is_empty() {
        ui::success("nothing to destroy");
        return Ok(());
    }

    if !args.yes {
        let prompt = format!(
            "Delete {} node(s) and {} link(s) from project {}?",
            nodes.len(),
            links.len(),
            ctx.project_name
        );
        if !Confirm::new().with_prompt(prompt).default(false).interact()? {
            ui::dim("aborted");
            return Ok(());
        }
    }

    let mut failures = 0usize;

    // Links first so node deletion never races an attached link.
    for link in &links {
        if let Err(e) = client.delete_link(&link.id, &ctx.project_id) {
            warn!("failed to delete link {}: {e}", link.id);
            failures += 1;
        }
    }
    for node in &nodes {
        if let Err(e) = client.delete_node(&node.id, &ctx.project_id) {
            warn!("failed to delete node {}: {e}", node.name);
            failures += 1;
        }
    }

    // Drop every tracked address for the project.
    let store = StateStore::new(ctx.state_dir.clone());
    match store.list() {
        Ok(addresses) => {
            for address in addresses {
                if let Err(e) = store.untrack(&address) {
                    warn!("{e}");
                }
            }
        }
        Err(e) => warn!("could not list state: {e}"),
    }

    if failures > 0 {
        anyhow::bail!("{failures} resource(s) failed to delete");
    }
    ui::success(&format!(
        "destroyed {} node(s) and {} link(s)",
        nodes.len(),
        links.len()
    ));
    Ok(())
}
