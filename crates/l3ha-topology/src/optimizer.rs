//! Topology optimizer: judges each router's placement against the
//! zones it serves.

use serde::Serialize;
use tracing::{info, warn};

use l3ha_core::{ControlPlane, ControlPlaneResult};

use crate::layout::{AgentMatch, RouterLayout, RouterPlacement, discover_router_layout};

/// What to do with one router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Recommendation {
    /// The hosting agent is in a zone the router serves.
    Keep,
    /// The hosting agent has no zone, so placement cannot be judged.
    Unjudged,
    /// Exactly one agent sits in the router's zones.
    Move { agent_id: String },
    /// No agent sits in any of the router's zones.
    NoDestination,
    /// Several agents qualify; picking one is left to the operator.
    Ambiguous { agent_ids: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterAdvice {
    pub router_id: String,
    pub agent_id: String,
    pub recommendation: Recommendation,
}

/// Judge a single router against the layout's agents.
pub fn recommend(layout: &RouterLayout, router: &RouterPlacement) -> Recommendation {
    if router.agent.availability_zone.is_none() {
        return Recommendation::Unjudged;
    }
    if router.is_local() {
        return Recommendation::Keep;
    }
    match layout.find_agent_for(&router.availability_zones) {
        AgentMatch::One(agent) => Recommendation::Move {
            agent_id: agent.id.clone(),
        },
        AgentMatch::None => Recommendation::NoDestination,
        AgentMatch::Many(agents) => Recommendation::Ambiguous {
            agent_ids: agents.iter().map(|a| a.id.clone()).collect(),
        },
    }
}

/// Read-only pass over every live router.
pub struct TopologyOptimizer<'a, C: ControlPlane + ?Sized> {
    control_plane: &'a C,
    agent_type: String,
}

impl<'a, C: ControlPlane + ?Sized> TopologyOptimizer<'a, C> {
    pub fn new(control_plane: &'a C, agent_type: impl Into<String>) -> Self {
        Self {
            control_plane,
            agent_type: agent_type.into(),
        }
    }

    /// Discover the layout and advise on every router in it.
    pub fn run(&self) -> ControlPlaneResult<Vec<RouterAdvice>> {
        let layout = discover_router_layout(self.control_plane, &self.agent_type)?;
        Ok(advise(&layout))
    }
}

/// Advice for every router in `layout`, logged as it is produced.
pub fn advise(layout: &RouterLayout) -> Vec<RouterAdvice> {
    let mut advice = Vec::with_capacity(layout.routers().len());
    for router in layout.routers() {
        let recommendation = recommend(layout, router);
        log_recommendation(router, &recommendation);
        advice.push(RouterAdvice {
            router_id: router.router_id.clone(),
            agent_id: router.agent.id.clone(),
            recommendation,
        });
    }

    let moves = advice
        .iter()
        .filter(|a| matches!(a.recommendation, Recommendation::Move { .. }))
        .count();
    info!(routers = advice.len(), moves, "topology check finished");
    advice
}

fn log_recommendation(router: &RouterPlacement, recommendation: &Recommendation) {
    let zones = router
        .availability_zones
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    match recommendation {
        Recommendation::Unjudged => warn!(
            router = %router.router_id,
            agent = %router.agent.id,
            "hosting agent has no availability zone"
        ),
        Recommendation::Keep => {
            info!(router = %router.router_id, agent = %router.agent.id, zones = %zones, "router serves its zones, no move needed")
        }
        Recommendation::Move { agent_id } => info!(
            router = %router.router_id,
            agent = %router.agent.id,
            target = %agent_id,
            zones = %zones,
            "router should move"
        ),
        Recommendation::NoDestination => warn!(
            router = %router.router_id,
            agent = %router.agent.id,
            zones = %zones,
            "no agent found in the router's zones"
        ),
        Recommendation::Ambiguous { agent_ids } => warn!(
            router = %router.router_id,
            agent = %router.agent.id,
            zones = %zones,
            candidates = ?agent_ids,
            "multiple agents found for the router's zones"
        ),
    }
}
