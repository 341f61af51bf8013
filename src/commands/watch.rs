//! `watch` - reconcile continuously until interrupted.

use std::time::Duration;

use anyhow::Result;

use crate::cli::WatchArgs;
use crate::engine::Reconciler;
use crate::engine::scheduler::Scheduler;
use crate::ui;

pub fn run(args: &WatchArgs) -> Result<()> {
    let ctx = super::setup(&args.topology, true)?;
    ui::info(&format!(
        "watching {} against {} (ctrl-c to stop)",
        ctx.topology_path.display(),
        ctx.server
    ));

    let reconciler = Reconciler::new(ctx);
    Scheduler::new(reconciler, Duration::from_secs(args.interval)).run()?;

    ui::success("stopped");
    Ok(())
}
