//! JSON bodies exchanged with the Networking API, and their conversion
//! into core snapshots.

use serde::{Deserialize, Serialize};

use l3ha_core::{Agent, FloatingIp, Port, Router};

#[derive(Debug, Deserialize)]
pub struct AgentList {
    pub agents: Vec<AgentRecord>,
}

#[derive(Debug, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub host: String,
    pub agent_type: String,
    #[serde(default)]
    pub alive: bool,
    #[serde(default)]
    pub admin_state_up: bool,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub configurations: AgentConfigurations,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentConfigurations {
    #[serde(default)]
    pub agent_mode: Option<String>,
}

impl From<AgentRecord> for Agent {
    fn from(record: AgentRecord) -> Self {
        // Deployments without zone support tag agents through the
        // description field instead.
        let availability_zone = non_empty(record.availability_zone).or(non_empty(record.description));
        Agent {
            id: record.id,
            host: record.host,
            agent_type: record.agent_type,
            alive: record.alive,
            admin_state_up: record.admin_state_up,
            agent_mode: record.configurations.agent_mode,
            availability_zone,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RouterList {
    pub routers: Vec<RouterRecord>,
}

#[derive(Debug, Deserialize)]
pub struct RouterRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ha: Option<bool>,
}

impl RouterRecord {
    pub fn into_router(self, agent_id: &str) -> Router {
        Router {
            id: self.id,
            agent_id: agent_id.to_string(),
            name: non_empty(self.name),
            ha: self.ha.unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddRouterRequest<'a> {
    pub router_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct PortList {
    pub ports: Vec<PortRecord>,
}

#[derive(Debug, Deserialize)]
pub struct PortRecord {
    pub id: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub device_owner: String,
    pub network_id: String,
    #[serde(rename = "binding:host_id", default)]
    pub host_id: Option<String>,
    #[serde(rename = "binding:vif_type", default)]
    pub vif_type: Option<String>,
    #[serde(default)]
    pub status: String,
}

impl From<PortRecord> for Port {
    fn from(record: PortRecord) -> Self {
        Port {
            id: record.id,
            device_id: record.device_id,
            device_owner: record.device_owner,
            network_id: record.network_id,
            host_id: record.host_id.unwrap_or_default(),
            vif_type: record.vif_type.unwrap_or_default(),
            status: record.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FloatingIpList {
    pub floatingips: Vec<FloatingIpRecord>,
}

#[derive(Debug, Deserialize)]
pub struct FloatingIpRecord {
    pub id: String,
    #[serde(default)]
    pub status: String,
}

impl From<FloatingIpRecord> for FloatingIp {
    fn from(record: FloatingIpRecord) -> Self {
        FloatingIp {
            id: record.id,
            status: record.status,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
