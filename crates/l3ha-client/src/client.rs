//! Blocking HTTP client for the Networking API.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use l3ha_core::{
    Agent, ControlPlane, ControlPlaneError, ControlPlaneResult, FloatingIp, Port, PortQuery,
    Router,
};

use crate::wire::{AddRouterRequest, AgentList, FloatingIpList, PortList, RouterList};

const AUTH_HEADER: &str = "X-Auth-Token";

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors building a [`NetworkClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError,
    },

    #[error("endpoint {0} cannot carry a path")]
    OpaqueEndpoint(String),

    #[error("failed to read CA certificate {path}: {source}")]
    CaCertRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid CA certificate {path}: {source}")]
    CaCertParse {
        path: PathBuf,
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Networking API, e.g. `https://network.example:9696/`.
    pub endpoint: String,
    pub token: Option<String>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    pub ca_cert: Option<PathBuf>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            insecure: false,
            ca_cert: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// [`ControlPlane`] over the Networking v2.0 REST API.
#[derive(Debug, Clone)]
pub struct NetworkClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl NetworkClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let base_url =
            Url::parse(&config.endpoint).map_err(|source| ClientError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                source,
            })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::OpaqueEndpoint(config.endpoint));
        }

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure);
        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path).map_err(|source| ClientError::CaCertRead {
                path: path.clone(),
                source,
            })?;
            let cert =
                reqwest::Certificate::from_pem(&pem).map_err(|source| ClientError::CaCertParse {
                    path: path.clone(),
                    source,
                })?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            token: config.token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base_url` with `segments` appended, each one percent-encoded.
    fn url(&self, segments: &[&str]) -> ControlPlaneResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ControlPlaneError::Transport(format!("bad endpoint {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTH_HEADER, token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> ControlPlaneResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;
        check_status(response)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> ControlPlaneResult<T> {
        let url = self.url(segments)?;
        debug!(%url, ?query, "GET");
        self.send(self.http.get(url).query(query))?
            .json()
            .map_err(|e| ControlPlaneError::Decode(e.to_string()))
    }
}

fn check_status(response: Response) -> ControlPlaneResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => ControlPlaneError::NotFound(body),
        StatusCode::CONFLICT => ControlPlaneError::Rejected(body),
        _ => ControlPlaneError::Status {
            status: status.as_u16(),
            body,
        },
    })
}

impl ControlPlane for NetworkClient {
    fn list_agents(&self, agent_type: Option<&str>) -> ControlPlaneResult<Vec<Agent>> {
        let query: Vec<(&str, &str)> = agent_type.map(|t| ("agent_type", t)).into_iter().collect();
        let list: AgentList = self.get_json(&["v2.0", "agents"], &query)?;
        Ok(list.agents.into_iter().map(Agent::from).collect())
    }

    fn list_routers_on_agent(&self, agent_id: &str) -> ControlPlaneResult<Vec<Router>> {
        let list: RouterList = self.get_json(&["v2.0", "agents", agent_id, "l3-routers"], &[])?;
        Ok(list
            .routers
            .into_iter()
            .map(|r| r.into_router(agent_id))
            .collect())
    }

    fn add_router_to_agent(&self, agent_id: &str, router_id: &str) -> ControlPlaneResult<()> {
        let url = self.url(&["v2.0", "agents", agent_id, "l3-routers"])?;
        debug!(%url, router = router_id, "POST");
        self.send(self.http.post(url).json(&AddRouterRequest { router_id }))?;
        Ok(())
    }

    fn remove_router_from_agent(&self, agent_id: &str, router_id: &str) -> ControlPlaneResult<()> {
        let url = self.url(&["v2.0", "agents", agent_id, "l3-routers", router_id])?;
        debug!(%url, "DELETE");
        self.send(self.http.delete(url))?;
        Ok(())
    }

    fn list_ports(&self, query: &PortQuery) -> ControlPlaneResult<Vec<Port>> {
        let params: Vec<(&str, &str)> = [
            ("device_id", query.device_id.as_deref()),
            ("device_owner", query.device_owner.as_deref()),
            ("network_id", query.network_id.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();
        let list: PortList = self.get_json(&["v2.0", "ports"], &params)?;
        Ok(list.ports.into_iter().map(Port::from).collect())
    }

    fn list_floating_ips(&self, router_id: &str) -> ControlPlaneResult<Vec<FloatingIp>> {
        let list: FloatingIpList =
            self.get_json(&["v2.0", "floatingips"], &[("router_id", router_id)])?;
        Ok(list.floatingips.into_iter().map(FloatingIp::from).collect())
    }
}
