//! External infra-state store synchronization.
//!
//! The Terraform state in `projects/<name>/terraform` is the engine's only
//! persisted memory of past actions. After each pass the delta of resources
//! actually added and removed is replayed into it: removed resources are
//! untracked, added resources are imported under `kind.name` with a
//! composite `project_id/remote_id`. Every operation is independent and
//! best-effort; imports are idempotent by address, so any inconsistency
//! heals on a later pass.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{Error, Result};
use crate::runner::run_capture_in;

/// Tracked-address type for links.
pub const LINK_TYPE: &str = "gns3_link";

/// One resource the store should start or stop tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedResource {
    /// Resource kind, e.g. `gns3_qemu_node` or `gns3_link`.
    pub resource_type: String,
    /// Logical name within the project.
    pub name: String,
    /// Remote ID on the platform; may be empty when creation never
    /// reported one.
    pub id: String,
}

impl TrackedResource {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            id: id.into(),
        }
    }

    /// Address of this resource in the store (`kind.name`).
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    /// Composite import identifier, or `None` when the remote ID is
    /// missing (link imports require one).
    #[must_use]
    pub fn import_id(&self, project_id: &str) -> Option<String> {
        if self.id.is_empty() {
            return None;
        }
        Some(format!("{project_id}/{}", self.id))
    }
}

/// Wrapper around the Terraform CLI scoped to one project's state directory.
pub struct StateStore {
    dir: PathBuf,
    bin: String,
}

impl StateStore {
    /// Terraform directory for a project name (`projects/<name>/terraform`).
    #[must_use]
    pub fn dir_for_project(project_name: &str) -> PathBuf {
        Path::new("projects").join(project_name).join("terraform")
    }

    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            bin: "terraform".to_string(),
        }
    }

    #[cfg(test)]
    fn with_binary(dir: PathBuf, bin: impl Into<String>) -> Self {
        Self {
            dir,
            bin: bin.into(),
        }
    }

    /// List all tracked resource addresses.
    pub fn list(&self) -> Result<Vec<String>> {
        let out = run_capture_in(&self.bin, &["state", "list"], &self.dir).map_err(|e| {
            Error::StateSync {
                address: "*".to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Stop tracking an address. An address the store never tracked
    /// counts as success.
    pub fn untrack(&self, address: &str) -> Result<()> {
        match run_capture_in(&self.bin, &["state", "rm", address], &self.dir) {
            Ok(_) => Ok(()),
            Err(e) if is_not_tracked(&e.to_string()) => Ok(()),
            Err(e) => Err(Error::StateSync {
                address: address.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Import a resource at an address with a composite remote ID.
    pub fn import(&self, address: &str, import_id: &str) -> Result<()> {
        run_capture_in(&self.bin, &["import", address, import_id], &self.dir)
            .map(|_| ())
            .map_err(|e| Error::StateSync {
                address: address.to_string(),
                message: e.to_string(),
            })
    }

    /// Replay one pass's delta into the store, best-effort per resource.
    pub fn sync_delta(
        &self,
        project_id: &str,
        added: &[TrackedResource],
        removed: &[TrackedResource],
    ) {
        for res in removed {
            let address = res.address();
            info!("untracking removed {address}");
            if let Err(e) = self.untrack(&address) {
                warn!("{e}");
            }
        }

        for res in added {
            let address = res.address();
            let Some(import_id) = res.import_id(project_id) else {
                warn!("skipping import of {address}: missing remote id");
                continue;
            };
            // An earlier incarnation may still hold this exact address.
            // Only this address: sibling entries like `...R10` next to
            // `...R1` stay untouched.
            if let Err(e) = self.untrack(&address) {
                warn!("{e}");
            }
            info!("importing {address} <- {import_id}");
            match self.import(&address, &import_id) {
                Ok(()) => info!("imported {address}"),
                Err(e) => warn!("{e}"),
            }
        }
    }
}

/// Whether a `state rm` failure means the address was never tracked.
fn is_not_tracked(message: &str) -> bool {
    message.contains("Invalid target address")
        || message.contains("No matching objects found")
        || message.contains("does not exist in the configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_joins_type_and_name() {
        let res = TrackedResource::new("gns3_qemu_node", "R1", "abc");
        assert_eq!(res.address(), "gns3_qemu_node.R1");
    }

    #[test]
    fn import_id_is_project_scoped() {
        let res = TrackedResource::new(LINK_TYPE, "R1_to_R2", "l-9");
        assert_eq!(res.import_id("p-1").as_deref(), Some("p-1/l-9"));
    }

    #[test]
    fn empty_remote_id_yields_no_import_id() {
        let res = TrackedResource::new(LINK_TYPE, "R1_to_R2", "");
        assert_eq!(res.import_id("p-1"), None);
    }

    #[test]
    fn missing_address_counts_as_untracked() {
        assert!(is_not_tracked(
            "Error: Invalid target address\n\nNo matching objects found."
        ));
        assert!(!is_not_tracked("Error: state file locked"));
    }

    #[test]
    fn import_cleanup_never_touches_sibling_addresses() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let bin = dir.path().join("tf");
        let log = dir.path().join("calls.log");
        // Fake state binary: records every invocation, reports R10 as the
        // only tracked address.
        fs::write(
            &bin,
            format!(
                "#!/bin/sh\necho \"$@\" >> {}\nif [ \"$1\" = state ] && [ \"$2\" = list ]; then echo gns3_qemu_node.R10; fi\n",
                log.display()
            ),
        )
        .expect("write fake binary");
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).expect("chmod");

        let store = StateStore::with_binary(dir.path().to_path_buf(), bin.display().to_string());
        store.sync_delta(
            "p-1",
            &[TrackedResource::new("gns3_qemu_node", "R1", "n-1")],
            &[],
        );

        let calls = fs::read_to_string(&log).expect("fake binary was invoked");
        assert!(calls.contains("state rm gns3_qemu_node.R1\n"));
        assert!(
            !calls.contains("state rm gns3_qemu_node.R10"),
            "importing R1 untracked R10: {calls}"
        );
        assert!(calls.contains("import gns3_qemu_node.R1 p-1/n-1"));
    }

    #[test]
    fn project_state_dir_layout() {
        assert_eq!(
            StateStore::dir_for_project("netlab"),
            Path::new("projects/netlab/terraform")
        );
    }
}
