//! Router layout: which live agent hosts which router, and which
//! availability zones each router serves.
//!
//! A router's zones are derived, not configured: every network the
//! router has an interface on is scanned for compute ports, and the zone
//! suffix of their `compute:<az>` owner is collected.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use l3ha_core::control_plane::schedulable_router_ids;
use l3ha_core::{Agent, ControlPlane, ControlPlaneResult, PortQuery, ROUTER_INTERFACE_OWNER};

/// A router, the agent hosting it, and the zones it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterPlacement {
    pub router_id: String,
    pub agent: Agent,
    pub availability_zones: BTreeSet<String>,
}

impl RouterPlacement {
    pub fn new(router_id: impl Into<String>, agent: Agent) -> Self {
        Self {
            router_id: router_id.into(),
            agent,
            availability_zones: BTreeSet::new(),
        }
    }

    pub fn with_availability_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.availability_zones = zones.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the hosting agent sits in one of the served zones.
    pub fn is_local(&self) -> bool {
        self.agent
            .availability_zone
            .as_ref()
            .is_some_and(|az| self.availability_zones.contains(az))
    }
}

/// Result of looking up agents for a set of zones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentMatch<'a> {
    None,
    One(&'a Agent),
    Many(Vec<&'a Agent>),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterLayout {
    agents: Vec<Agent>,
    routers: Vec<RouterPlacement>,
}

impl RouterLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_agent(&mut self, agent: Agent) {
        self.agents.push(agent);
    }

    pub fn add_router(&mut self, router: RouterPlacement) {
        self.routers.push(router);
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn routers(&self) -> &[RouterPlacement] {
        &self.routers
    }

    /// Agents configured for `availability_zone`. Agents without a zone
    /// never match.
    pub fn find_agents_for_az(&self, availability_zone: &str) -> Vec<&Agent> {
        self.agents
            .iter()
            .filter(|a| a.availability_zone.as_deref() == Some(availability_zone))
            .collect()
    }

    /// Agents whose zone is any of `availability_zones`, deduplicated by
    /// agent id, in layout order.
    pub fn find_agent_for<'z, I>(&self, availability_zones: I) -> AgentMatch<'_>
    where
        I: IntoIterator<Item = &'z String>,
    {
        let zones: BTreeSet<&str> = availability_zones.into_iter().map(String::as_str).collect();
        let mut seen = BTreeSet::new();
        let mut candidates: Vec<&Agent> = self
            .agents
            .iter()
            .filter(|a| a.availability_zone.as_deref().is_some_and(|az| zones.contains(az)))
            .filter(|a| seen.insert(a.id.as_str()))
            .collect();

        match candidates.len() {
            0 => AgentMatch::None,
            1 => AgentMatch::One(candidates.remove(0)),
            _ => AgentMatch::Many(candidates),
        }
    }
}

/// Build a layout from the live agents of `agent_type` and the
/// non-HA routers they host.
pub fn discover_router_layout<C: ControlPlane + ?Sized>(
    control_plane: &C,
    agent_type: &str,
) -> ControlPlaneResult<RouterLayout> {
    let mut layout = RouterLayout::new();
    let agents: Vec<Agent> = control_plane
        .list_agents(Some(agent_type))?
        .into_iter()
        .filter(Agent::is_eligible_destination)
        .collect();

    for agent in agents {
        for router_id in schedulable_router_ids(control_plane, &agent.id)? {
            let zones = router_availability_zones(control_plane, &router_id)?;
            debug!(router = %router_id, agent = %agent.id, zones = ?zones, "router zones");
            layout.add_router(RouterPlacement {
                router_id,
                agent: agent.clone(),
                availability_zones: zones,
            });
        }
        layout.add_agent(agent);
    }

    info!(
        agents = layout.agents.len(),
        routers = layout.routers.len(),
        "discovered router layout"
    );
    Ok(layout)
}

/// Networks the router has an interface on, sorted and deduplicated.
pub fn network_ids_for_router<C: ControlPlane + ?Sized>(
    control_plane: &C,
    router_id: &str,
) -> ControlPlaneResult<BTreeSet<String>> {
    let query = PortQuery::device(router_id).with_device_owner(ROUTER_INTERFACE_OWNER);
    Ok(control_plane
        .list_ports(&query)?
        .into_iter()
        .map(|p| p.network_id)
        .collect())
}

/// Zones of the compute ports plugged into a network.
pub fn compute_azs_connected_to<C: ControlPlane + ?Sized>(
    control_plane: &C,
    network_id: &str,
) -> ControlPlaneResult<BTreeSet<String>> {
    Ok(control_plane
        .list_ports(&PortQuery::network(network_id))?
        .iter()
        .filter_map(|p| p.compute_availability_zone())
        .map(str::to_string)
        .collect())
}

fn router_availability_zones<C: ControlPlane + ?Sized>(
    control_plane: &C,
    router_id: &str,
) -> ControlPlaneResult<BTreeSet<String>> {
    let mut zones = BTreeSet::new();
    for network_id in network_ids_for_router(control_plane, router_id)? {
        zones.extend(compute_azs_connected_to(control_plane, &network_id)?);
    }
    Ok(zones)
}
