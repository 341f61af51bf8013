//! Reconciler context.
//!
//! Everything that is fixed at startup lives here and is passed explicitly
//! to the components that need it; nothing is global.

use std::path::PathBuf;

use crate::state::StateStore;

/// Immutable per-run configuration.
#[derive(Debug, Clone)]
pub struct Context {
    /// Platform base address, e.g. `http://localhost:3080`.
    pub server: String,
    /// Project name from the topology.
    pub project_name: String,
    /// Remote project ID resolved at startup.
    pub project_id: String,
    /// Path of the desired-state file, re-read every pass.
    pub topology_path: PathBuf,
    /// State-store working directory for this project.
    pub state_dir: PathBuf,
}

impl Context {
    /// Assemble a context for a resolved project.
    #[must_use]
    pub fn new(
        server: String,
        project_name: String,
        project_id: String,
        topology_path: PathBuf,
    ) -> Self {
        let state_dir = StateStore::dir_for_project(&project_name);
        Self {
            server,
            project_name,
            project_id,
            topology_path,
            state_dir,
        }
    }
}
