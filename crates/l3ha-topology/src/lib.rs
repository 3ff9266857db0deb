//! Availability-zone aware router placement advice.
//!
//! Routers forward traffic for the instances on their networks. When a
//! router lives on an agent in a different availability zone than those
//! instances, traffic crosses zones for no reason. This crate finds such
//! routers and names a better agent. It only reads from the control
//! plane; acting on the advice is left to the operator.
//!
//! # Components
//!
//! - **`layout`**: Snapshot of live agents and their routers' zones
//! - **`optimizer`**: Per-router recommendations over a layout

pub mod layout;
pub mod optimizer;

pub use layout::{AgentMatch, RouterLayout, RouterPlacement, discover_router_layout};
pub use optimizer::{Recommendation, RouterAdvice, TopologyOptimizer, advise, recommend};
