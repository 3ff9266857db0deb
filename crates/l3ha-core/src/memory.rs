//! In-process control plane.
//!
//! Keeps agents, router ownership, ports and floating IPs in memory and
//! reacts to detach/attach the way the real control plane does: detaching
//! a router unbinds its ports from the old host, attaching binds them to
//! the new host and marks them ACTIVE. Individual calls can be made to
//! fail to exercise error paths.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::control_plane::{ControlPlane, PortQuery};
use crate::error::{ControlPlaneError, ControlPlaneResult};
use crate::types::{Agent, FloatingIp, Port, ROUTER_INTERFACE_OWNER, Router, STATUS_ACTIVE};

/// Port status after the router has been unscheduled.
const STATUS_DOWN: &str = "DOWN";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Call {
    ListAgents,
    ListRouters(String),
    AddRouter(String),
    AddRouterTo(String, String),
    RemoveRouter(String),
    ListPorts,
    ListFloatingIps(String),
}

#[derive(Debug, Default)]
struct Inner {
    agents: Vec<Agent>,
    /// Agent id → router ids, in scheduling order.
    routers_by_agent: HashMap<String, Vec<String>>,
    ha_routers: HashSet<String>,
    ports: Vec<Port>,
    floating_ips: HashMap<String, Vec<FloatingIp>>,
    /// Routers whose ports stay ACTIVE on the old host after detach.
    stuck_routers: HashSet<String>,
    failures: HashSet<Call>,
    /// Agent id → number of agent listings after which it comes back.
    revivals: Vec<(String, usize)>,
    list_agent_calls: usize,
    list_router_calls: usize,
    floating_ip_calls: usize,
    mutations: usize,
}

/// A [`ControlPlane`] backed by plain collections.
#[derive(Debug, Default)]
pub struct MemoryControlPlane {
    inner: RefCell<Inner>,
}

impl MemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding ────────────────────────────────────────────────────

    pub fn add_agent(&self, agent: Agent) {
        self.inner.borrow_mut().agents.push(agent);
    }

    /// Schedule a router on an agent.
    pub fn add_router(&self, agent_id: &str, router_id: &str) {
        self.inner
            .borrow_mut()
            .routers_by_agent
            .entry(agent_id.to_string())
            .or_default()
            .push(router_id.to_string());
    }

    pub fn add_ha_router(&self, agent_id: &str, router_id: &str) {
        self.add_router(agent_id, router_id);
        self.inner.borrow_mut().ha_routers.insert(router_id.to_string());
    }

    pub fn add_port(&self, port: Port) {
        self.inner.borrow_mut().ports.push(port);
    }

    /// Attach a router to a network through an interface port bound to
    /// `host`.
    pub fn add_router_interface(&self, router_id: &str, network_id: &str, host: &str) {
        let id = format!("port-{}", self.inner.borrow().ports.len());
        self.add_port(Port {
            id,
            device_id: router_id.to_string(),
            device_owner: ROUTER_INTERFACE_OWNER.to_string(),
            network_id: network_id.to_string(),
            host_id: host.to_string(),
            vif_type: "ovs".to_string(),
            status: STATUS_ACTIVE.to_string(),
        });
    }

    /// Plug an instance running in `availability_zone` into a network.
    pub fn add_compute_port(&self, network_id: &str, availability_zone: &str) {
        let id = format!("port-{}", self.inner.borrow().ports.len());
        self.add_port(Port {
            device_id: format!("vm-{id}"),
            id,
            device_owner: format!("compute:{availability_zone}"),
            network_id: network_id.to_string(),
            host_id: String::new(),
            vif_type: "ovs".to_string(),
            status: STATUS_ACTIVE.to_string(),
        });
    }

    pub fn add_floating_ip(&self, router_id: &str, id: &str, status: &str) {
        self.inner
            .borrow_mut()
            .floating_ips
            .entry(router_id.to_string())
            .or_default()
            .push(FloatingIp {
                id: id.to_string(),
                status: status.to_string(),
            });
    }

    /// Keep a router's ports ACTIVE on their old host after it is
    /// detached, so a drain wait never completes.
    pub fn hold_ports_on_detach(&self, router_id: &str) {
        self.inner.borrow_mut().stuck_routers.insert(router_id.to_string());
    }

    /// Bring a dead agent back once `listings` agent listings have been
    /// served.
    pub fn revive_after_listings(&self, agent_id: &str, listings: usize) {
        self.inner
            .borrow_mut()
            .revivals
            .push((agent_id.to_string(), listings));
    }

    // ── Failure injection ──────────────────────────────────────────

    pub fn fail_list_agents(&self) {
        self.inner.borrow_mut().failures.insert(Call::ListAgents);
    }

    pub fn fail_list_routers(&self, agent_id: &str) {
        self.inner
            .borrow_mut()
            .failures
            .insert(Call::ListRouters(agent_id.to_string()));
    }

    /// Fail every attach of this router.
    pub fn fail_add_router(&self, router_id: &str) {
        self.inner
            .borrow_mut()
            .failures
            .insert(Call::AddRouter(router_id.to_string()));
    }

    /// Fail attaching this router to one agent only.
    pub fn fail_add_router_to(&self, agent_id: &str, router_id: &str) {
        self.inner
            .borrow_mut()
            .failures
            .insert(Call::AddRouterTo(agent_id.to_string(), router_id.to_string()));
    }

    /// Fail every detach of this router.
    pub fn fail_remove_router(&self, router_id: &str) {
        self.inner
            .borrow_mut()
            .failures
            .insert(Call::RemoveRouter(router_id.to_string()));
    }

    pub fn fail_list_ports(&self) {
        self.inner.borrow_mut().failures.insert(Call::ListPorts);
    }

    pub fn fail_list_floating_ips(&self, router_id: &str) {
        self.inner
            .borrow_mut()
            .failures
            .insert(Call::ListFloatingIps(router_id.to_string()));
    }

    // ── Inspection ─────────────────────────────────────────────────

    /// Router ids currently scheduled on an agent.
    pub fn routers_on(&self, agent_id: &str) -> Vec<String> {
        self.inner
            .borrow()
            .routers_by_agent
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `list_routers_on_agent` calls served so far.
    pub fn list_router_calls(&self) -> usize {
        self.inner.borrow().list_router_calls
    }

    /// Number of `list_agents` calls served so far.
    pub fn list_agent_calls(&self) -> usize {
        self.inner.borrow().list_agent_calls
    }

    /// Number of `list_floating_ips` calls made so far, failed ones
    /// included.
    pub fn floating_ip_calls(&self) -> usize {
        self.inner.borrow().floating_ip_calls
    }

    /// Number of successful attach/detach calls so far.
    pub fn mutations(&self) -> usize {
        self.inner.borrow().mutations
    }

    pub fn ports_of(&self, router_id: &str) -> Vec<Port> {
        self.inner
            .borrow()
            .ports
            .iter()
            .filter(|p| p.device_id == router_id)
            .cloned()
            .collect()
    }

    fn check(&self, call: Call) -> ControlPlaneResult<()> {
        if self.inner.borrow().failures.contains(&call) {
            return Err(ControlPlaneError::Status {
                status: 500,
                body: format!("injected failure for {call:?}"),
            });
        }
        Ok(())
    }

    fn agent(&self, agent_id: &str) -> ControlPlaneResult<Agent> {
        self.inner
            .borrow()
            .agents
            .iter()
            .find(|a| a.id == agent_id)
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound(format!("agent {agent_id}")))
    }
}

impl ControlPlane for MemoryControlPlane {
    fn list_agents(&self, agent_type: Option<&str>) -> ControlPlaneResult<Vec<Agent>> {
        self.check(Call::ListAgents)?;
        let mut inner = self.inner.borrow_mut();
        inner.list_agent_calls += 1;
        let served = inner.list_agent_calls;
        let revived: Vec<String> = inner
            .revivals
            .iter()
            .filter(|(_, listings)| served > *listings)
            .map(|(id, _)| id.clone())
            .collect();
        for agent in inner.agents.iter_mut().filter(|a| revived.contains(&a.id)) {
            if !agent.alive {
                debug!(agent = %agent.id, "agent back online");
            }
            agent.alive = true;
        }
        Ok(inner
            .agents
            .iter()
            .filter(|a| agent_type.is_none_or(|t| a.agent_type == t))
            .cloned()
            .collect())
    }

    fn list_routers_on_agent(&self, agent_id: &str) -> ControlPlaneResult<Vec<Router>> {
        self.check(Call::ListRouters(agent_id.to_string()))?;
        let mut inner = self.inner.borrow_mut();
        inner.list_router_calls += 1;
        let ids = inner.routers_by_agent.get(agent_id).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .map(|id| Router {
                ha: inner.ha_routers.contains(&id),
                ..Router::new(&id, agent_id)
            })
            .collect())
    }

    fn add_router_to_agent(&self, agent_id: &str, router_id: &str) -> ControlPlaneResult<()> {
        self.check(Call::AddRouter(router_id.to_string()))?;
        self.check(Call::AddRouterTo(agent_id.to_string(), router_id.to_string()))?;
        let agent = self.agent(agent_id)?;
        let mut inner = self.inner.borrow_mut();

        let hosted = inner.routers_by_agent.values().any(|ids| ids.iter().any(|id| id == router_id));
        if hosted {
            return Err(ControlPlaneError::Rejected(format!(
                "router {router_id} is already hosted by an agent"
            )));
        }

        inner
            .routers_by_agent
            .entry(agent_id.to_string())
            .or_default()
            .push(router_id.to_string());
        for port in inner.ports.iter_mut().filter(|p| p.device_id == router_id) {
            port.host_id = agent.host.clone();
            port.status = STATUS_ACTIVE.to_string();
        }
        inner.mutations += 1;
        debug!(agent = agent_id, router = router_id, "router scheduled");
        Ok(())
    }

    fn remove_router_from_agent(&self, agent_id: &str, router_id: &str) -> ControlPlaneResult<()> {
        self.check(Call::RemoveRouter(router_id.to_string()))?;
        let agent = self.agent(agent_id)?;
        let mut inner = self.inner.borrow_mut();

        let ids = inner.routers_by_agent.entry(agent_id.to_string()).or_default();
        let Some(pos) = ids.iter().position(|id| id == router_id) else {
            return Err(ControlPlaneError::NotFound(format!(
                "router {router_id} on agent {agent_id}"
            )));
        };
        ids.remove(pos);

        if !inner.stuck_routers.contains(router_id) {
            for port in inner
                .ports
                .iter_mut()
                .filter(|p| p.device_id == router_id && p.host_id == agent.host)
            {
                port.host_id.clear();
                port.status = STATUS_DOWN.to_string();
            }
        }
        inner.mutations += 1;
        debug!(agent = agent_id, router = router_id, "router unscheduled");
        Ok(())
    }

    fn list_ports(&self, query: &PortQuery) -> ControlPlaneResult<Vec<Port>> {
        self.check(Call::ListPorts)?;
        Ok(self
            .inner
            .borrow()
            .ports
            .iter()
            .filter(|p| query.matches(p))
            .cloned()
            .collect())
    }

    fn list_floating_ips(&self, router_id: &str) -> ControlPlaneResult<Vec<FloatingIp>> {
        self.inner.borrow_mut().floating_ip_calls += 1;
        self.check(Call::ListFloatingIps(router_id.to_string()))?;
        Ok(self
            .inner
            .borrow()
            .floating_ips
            .get(router_id)
            .cloned()
            .unwrap_or_default())
    }
}
