//! `apply` - run a single reconciliation pass.

use anyhow::Result;

use crate::cli::TopologyArgs;
use crate::engine::Reconciler;
use crate::ui;

pub fn run(args: &TopologyArgs) -> Result<()> {
    let ctx = super::setup(args, true)?;
    let mut reconciler = Reconciler::new(ctx);
    let summary = reconciler.run_pass()?;

    if summary.changed() {
        ui::success(&format!(
            "applied: +{} -{} nodes, +{} -{} links, {} started",
            summary.nodes_created,
            summary.nodes_deleted,
            summary.links_created,
            summary.links_deleted,
            summary.nodes_started
        ));
    } else if summary.nodes_started > 0 {
        ui::success(&format!("in sync, started {} node(s)", summary.nodes_started));
    } else {
        ui::success("already in sync, nothing to do");
    }

    if !summary.is_clean() {
        for (address, message) in &summary.failures {
            ui::error(&format!("{address}: {message}"));
        }
        anyhow::bail!("{} resource(s) failed", summary.failures.len());
    }
    Ok(())
}
