//! Destination selection for router moves.
//!
//! This crate decides *where* a router goes and *which* routers are in
//! scope for a run. It never mutates the control plane; the only calls
//! it makes are router listings to count load.
//!
//! # Components
//!
//! - **`picker`**: Agent pickers (least-busy, random, single target)
//! - **`filter`**: Router eligibility (all, operator-supplied list file)

pub mod filter;
pub mod picker;

pub use filter::{FilterError, FilterResult, ListFileFilter, RouterFilter};
pub use picker::{
    AgentPicker, LeastBusyPicker, PickerConfig, PickerError, PickerResult, ROUTER_CACHE_MAX_AGE,
    RandomPicker, SingleAgentPicker,
};
