//! Remote network-simulation platform integration.
//!
//! Everything the engine knows about the platform lives here: the wire
//! types it reports and the blocking HTTP client used to observe and
//! actuate project resources.

pub mod client;
pub mod types;

pub use client::PlatformClient;
pub use types::{ObservedLink, ObservedNode, TemplateInfo};
