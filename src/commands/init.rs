//! `init` - write a starter topology file.

use std::fs;

use anyhow::{Context as AnyhowContext, Result, bail};

use crate::cli::InitArgs;
use crate::ui;

const STARTER: &str = r#"project:
  name: lab
  start_nodes: true
  terraform_version: '1.7'
  # server: http://localhost:3080

network-device:
  routers:
    - name: R1
      hostname: r1
      vendor: arista
      mac_address: 00:1c:73:00:00:01
      image: ceos-4.30.qcow2
      config:
        - hostname: r1
    - name: R2
      hostname: r2
      vendor: arista
      mac_address: 00:1c:73:00:00:02
      image: ceos-4.30.qcow2
      config:
        - hostname: r2

switches:
  - name: SW1

clouds: []

templates:
  servers:
    - name: ztp
      start: true

links:
  - endpoints:
      - name: R1
        adapter: 1
        port: 0
      - name: SW1
        adapter: 0
        port: 0
  - endpoints:
      - name: R2
        adapter: 1
        port: 0
      - name: SW1
        adapter: 0
        port: 1
"#;

pub fn run(args: &InitArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!(
            "{} already exists, pass --force to overwrite",
            args.path.display()
        );
    }

    fs::write(&args.path, STARTER)
        .with_context(|| format!("writing {}", args.path.display()))?;

    ui::success(&format!("wrote {}", args.path.display()));
    ui::dim("edit it, then run `labsync plan`");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Topology;

    #[test]
    fn starter_file_parses_and_validates() {
        let topo: Topology = serde_yaml::from_str(STARTER).unwrap();
        assert!(topo.validate().is_ok());
        assert_eq!(topo.project.name, "lab");
        assert_eq!(topo.links.len(), 2);
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.yaml");
        fs::write(&path, "project: {}").unwrap();

        let args = InitArgs { path, force: false };
        assert!(run(&args).is_err());
    }

    #[test]
    fn force_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.yaml");
        fs::write(&path, "old").unwrap();

        let args = InitArgs {
            path: path.clone(),
            force: true,
        };
        run(&args).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("network-device"));
    }
}
