//! The interface to the networking control plane.
//!
//! Every call is a blocking request/response. Implementations must not
//! retry on their own; callers decide what a failure means.

use crate::error::ControlPlaneResult;
use crate::types::{Agent, FloatingIp, Port, Router};

/// Filters for [`ControlPlane::list_ports`]. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortQuery {
    pub device_id: Option<String>,
    pub device_owner: Option<String>,
    pub network_id: Option<String>,
}

impl PortQuery {
    /// All ports of a device (router or instance).
    pub fn device(device_id: &str) -> Self {
        Self {
            device_id: Some(device_id.to_string()),
            ..Self::default()
        }
    }

    /// All ports on a network.
    pub fn network(network_id: &str) -> Self {
        Self {
            network_id: Some(network_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_device_owner(mut self, owner: &str) -> Self {
        self.device_owner = Some(owner.to_string());
        self
    }

    pub fn matches(&self, port: &Port) -> bool {
        self.device_id.as_ref().is_none_or(|d| *d == port.device_id)
            && self.device_owner.as_ref().is_none_or(|o| *o == port.device_owner)
            && self.network_id.as_ref().is_none_or(|n| *n == port.network_id)
    }
}

pub trait ControlPlane {
    /// List agents, optionally only those of `agent_type`.
    fn list_agents(&self, agent_type: Option<&str>) -> ControlPlaneResult<Vec<Agent>>;

    /// List the routers currently scheduled on an agent.
    fn list_routers_on_agent(&self, agent_id: &str) -> ControlPlaneResult<Vec<Router>>;

    fn add_router_to_agent(&self, agent_id: &str, router_id: &str) -> ControlPlaneResult<()>;

    fn remove_router_from_agent(&self, agent_id: &str, router_id: &str) -> ControlPlaneResult<()>;

    fn list_ports(&self, query: &PortQuery) -> ControlPlaneResult<Vec<Port>>;

    fn list_floating_ips(&self, router_id: &str) -> ControlPlaneResult<Vec<FloatingIp>>;
}

impl<T: ControlPlane + ?Sized> ControlPlane for &T {
    fn list_agents(&self, agent_type: Option<&str>) -> ControlPlaneResult<Vec<Agent>> {
        (**self).list_agents(agent_type)
    }

    fn list_routers_on_agent(&self, agent_id: &str) -> ControlPlaneResult<Vec<Router>> {
        (**self).list_routers_on_agent(agent_id)
    }

    fn add_router_to_agent(&self, agent_id: &str, router_id: &str) -> ControlPlaneResult<()> {
        (**self).add_router_to_agent(agent_id, router_id)
    }

    fn remove_router_from_agent(&self, agent_id: &str, router_id: &str) -> ControlPlaneResult<()> {
        (**self).remove_router_from_agent(agent_id, router_id)
    }

    fn list_ports(&self, query: &PortQuery) -> ControlPlaneResult<Vec<Port>> {
        (**self).list_ports(query)
    }

    fn list_floating_ips(&self, router_id: &str) -> ControlPlaneResult<Vec<FloatingIp>> {
        (**self).list_floating_ips(router_id)
    }
}

/// Router ids on an agent, excluding HA routers.
pub fn schedulable_router_ids<C: ControlPlane + ?Sized>(
    control_plane: &C,
    agent_id: &str,
) -> ControlPlaneResult<Vec<String>> {
    Ok(control_plane
        .list_routers_on_agent(agent_id)?
        .into_iter()
        .filter(|r| !r.ha)
        .map(|r| r.id)
        .collect())
}
