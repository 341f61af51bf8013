//! `plan` - preview the diff a pass would apply.

use anyhow::Result;

use crate::cli::TopologyArgs;
use crate::desired::NodeKind;
use crate::engine::Reconciler;
use crate::state::LINK_TYPE;
use crate::ui;

pub fn run(args: &TopologyArgs) -> Result<()> {
    let ctx = super::setup(args, false)?;
    let reconciler = Reconciler::new(ctx);
    let (nodes, links) = reconciler.plan()?;

    if nodes.is_empty() && links.is_empty() {
        ui::success("already in sync, nothing to do");
        return Ok(());
    }

    ui::header("Plan");
    for spec in &nodes.to_add {
        ui::plan_add(&spec.address());
    }
    for node in &nodes.to_del {
        let kind = NodeKind::from_node_type(&node.node_type);
        ui::plan_del(&format!("{}.{}", kind.resource_type(), node.name));
    }
    for link in &links.to_add {
        ui::plan_add(&format!("{LINK_TYPE}.{}", link.tf_name()));
    }
    for link in &links.to_del {
        ui::plan_del(&format!("{LINK_TYPE} {}", link.id));
    }

    println!();
    ui::dim(&format!(
        "{} to add, {} to remove",
        nodes.to_add.len() + links.to_add.len(),
        nodes.to_del.len() + links.to_del.len()
    ));
    Ok(())
}
