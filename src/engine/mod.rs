//! Reconciliation engine.
//!
//! The engine orchestrates:
//! 1. Diffing - set reconciliation over desired vs observed collections
//! 2. Reconciling - one full observe -> diff -> actuate -> sync pass
//! 3. Scheduling - the run-forever trigger loop

pub mod differ;
pub mod reconciler;
pub mod scheduler;

pub use reconciler::{PassSummary, Reconciler};
