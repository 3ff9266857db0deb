//! Snapshots of control-plane objects.
//!
//! All of these are fetched fresh at the start of a run and never
//! persisted. They serialize to JSON so the CLI can print them.

use serde::{Deserialize, Serialize};

/// Unique identifier for a network agent.
pub type AgentId = String;

/// Unique identifier for a router.
pub type RouterId = String;

/// Agent type string of the agents that host routers.
pub const L3_AGENT_TYPE: &str = "L3 agent";

/// `device_owner` of a port that connects a router to a network.
pub const ROUTER_INTERFACE_OWNER: &str = "network:router_interface";

/// Prefix of `device_owner` for ports of compute instances. The remainder
/// of the string is the availability zone of the instance.
pub const COMPUTE_OWNER_PREFIX: &str = "compute:";

/// Port and floating IP status once the data plane is wired up.
pub const STATUS_ACTIVE: &str = "ACTIVE";

/// `vif_type` of ports that live on every host at once.
pub const VIF_TYPE_DISTRIBUTED: &str = "distributed";

// ── Agent ──────────────────────────────────────────────────────────

/// A network agent host capable of owning routers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub host: String,
    pub agent_type: String,
    pub alive: bool,
    pub admin_state_up: bool,
    /// e.g. `legacy`, `dvr`, `dvr_snat`.
    pub agent_mode: Option<String>,
    pub availability_zone: Option<String>,
}

impl Agent {
    /// Build a live, enabled L3 agent.
    pub fn new(id: &str, host: &str) -> Self {
        Self {
            id: id.to_string(),
            host: host.to_string(),
            agent_type: L3_AGENT_TYPE.to_string(),
            alive: true,
            admin_state_up: true,
            agent_mode: None,
            availability_zone: None,
        }
    }

    pub fn with_alive(mut self, alive: bool) -> Self {
        self.alive = alive;
        self
    }

    pub fn with_admin_state_up(mut self, up: bool) -> Self {
        self.admin_state_up = up;
        self
    }

    pub fn with_agent_mode(mut self, mode: &str) -> Self {
        self.agent_mode = Some(mode.to_string());
        self
    }

    pub fn with_availability_zone(mut self, az: &str) -> Self {
        self.availability_zone = Some(az.to_string());
        self
    }

    /// Whether routers may be scheduled onto this agent.
    pub fn is_eligible_destination(&self) -> bool {
        self.alive && self.admin_state_up
    }

    /// Whether this agent's routers need to go elsewhere.
    pub fn is_dead(&self) -> bool {
        !self.alive
    }
}

// ── Router ─────────────────────────────────────────────────────────

/// A logical router, as listed on the agent that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    pub id: RouterId,
    /// The agent the router was listed on.
    pub agent_id: AgentId,
    pub name: Option<String>,
    /// HA routers are scheduled by the control plane itself.
    #[serde(default)]
    pub ha: bool,
}

impl Router {
    pub fn new(id: &str, agent_id: &str) -> Self {
        Self {
            id: id.to_string(),
            agent_id: agent_id.to_string(),
            name: None,
            ha: false,
        }
    }
}

// ── Port ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub device_id: String,
    pub device_owner: String,
    pub network_id: String,
    /// Host the port is bound to (`binding:host_id`).
    pub host_id: String,
    /// `binding:vif_type`.
    pub vif_type: String,
    pub status: String,
}

impl Port {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    pub fn is_distributed(&self) -> bool {
        self.vif_type == VIF_TYPE_DISTRIBUTED
    }

    /// Availability zone of the compute instance behind this port, if it
    /// belongs to one.
    pub fn compute_availability_zone(&self) -> Option<&str> {
        self.device_owner.strip_prefix(COMPUTE_OWNER_PREFIX)
    }
}

// ── Floating IP ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub status: String,
}

impl FloatingIp {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}
