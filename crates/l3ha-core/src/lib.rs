//! l3ha-core: shared types for the L3 agent high-availability toolkit.
//!
//! Everything the decision crates need to talk about the networking
//! control plane lives here: the agent/router/port snapshots, the
//! [`ControlPlane`] trait they are fetched through, and the optional
//! TOML configuration file.
//!
//! [`MemoryControlPlane`] is a complete in-process implementation of the
//! trait, used by the test suites of every crate in the workspace.

pub mod config;
pub mod control_plane;
pub mod error;
pub mod memory;
pub mod types;

pub use config::ToolConfig;
pub use control_plane::{ControlPlane, PortQuery};
pub use error::{ConfigError, ControlPlaneError, ControlPlaneResult};
pub use memory::MemoryControlPlane;
pub use types::*;
