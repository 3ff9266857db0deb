//! NetworkClient against a mock Networking API.

use std::io::Write;
use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;

use l3ha_client::{ClientConfig, ClientError, NetworkClient};
use l3ha_core::{ControlPlane, ControlPlaneError, PortQuery};

fn make_client(server: &Server) -> NetworkClient {
    NetworkClient::new(ClientConfig {
        token: Some("secret".into()),
        timeout: Duration::from_secs(5),
        ..ClientConfig::new(server.url())
    })
    .unwrap()
}

#[test]
fn lists_agents_of_type_with_token() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/v2.0/agents")
        .match_header("x-auth-token", "secret")
        .match_query(Matcher::UrlEncoded("agent_type".into(), "L3 agent".into()))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "agents": [
                    {
                        "id": "agent-1",
                        "host": "net1",
                        "agent_type": "L3 agent",
                        "alive": true,
                        "admin_state_up": true,
                        "description": "az1",
                        "configurations": { "agent_mode": "dvr_snat" }
                    },
                    {
                        "id": "agent-2",
                        "host": "net2",
                        "agent_type": "L3 agent",
                        "alive": false,
                        "admin_state_up": true
                    }
                ]
            })
            .to_string(),
        )
        .create();

    let agents = make_client(&server).list_agents(Some("L3 agent")).unwrap();

    mock.assert();
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0].availability_zone.as_deref(), Some("az1"));
    assert_eq!(agents[0].agent_mode.as_deref(), Some("dvr_snat"));
    assert!(agents[1].is_dead());
}

#[test]
fn lists_routers_on_agent() {
    let mut server = Server::new();
    server
        .mock("GET", "/v2.0/agents/agent-1/l3-routers")
        .with_body(
            json!({
                "routers": [
                    { "id": "router-1", "name": "edge" },
                    { "id": "router-2", "ha": true }
                ]
            })
            .to_string(),
        )
        .create();

    let routers = make_client(&server).list_routers_on_agent("agent-1").unwrap();

    assert_eq!(routers.len(), 2);
    assert_eq!(routers[0].name.as_deref(), Some("edge"));
    assert_eq!(routers[0].agent_id, "agent-1");
    assert!(routers[1].ha);
}

#[test]
fn adds_and_removes_router() {
    let mut server = Server::new();
    let add = server
        .mock("POST", "/v2.0/agents/agent-2/l3-routers")
        .match_body(Matcher::Json(json!({ "router_id": "router-1" })))
        .with_status(201)
        .create();
    let remove = server
        .mock("DELETE", "/v2.0/agents/agent-1/l3-routers/router-1")
        .with_status(204)
        .create();

    let client = make_client(&server);
    client.remove_router_from_agent("agent-1", "router-1").unwrap();
    client.add_router_to_agent("agent-2", "router-1").unwrap();

    remove.assert();
    add.assert();
}

#[test]
fn port_query_becomes_parameters() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/v2.0/ports")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("device_id".into(), "router-1".into()),
            Matcher::UrlEncoded("device_owner".into(), "network:router_interface".into()),
        ]))
        .with_body(
            json!({
                "ports": [{
                    "id": "port-1",
                    "device_id": "router-1",
                    "device_owner": "network:router_interface",
                    "network_id": "net-1",
                    "binding:host_id": "net1",
                    "binding:vif_type": "ovs",
                    "status": "ACTIVE"
                }]
            })
            .to_string(),
        )
        .create();

    let query = PortQuery::device("router-1").with_device_owner("network:router_interface");
    let ports = make_client(&server).list_ports(&query).unwrap();

    mock.assert();
    assert_eq!(ports[0].network_id, "net-1");
    assert_eq!(ports[0].host_id, "net1");
}

#[test]
fn lists_floating_ips_of_router() {
    let mut server = Server::new();
    server
        .mock("GET", "/v2.0/floatingips")
        .match_query(Matcher::UrlEncoded("router_id".into(), "router-1".into()))
        .with_body(json!({ "floatingips": [{ "id": "fip-1", "status": "DOWN" }] }).to_string())
        .create();

    let fips = make_client(&server).list_floating_ips("router-1").unwrap();

    assert_eq!(fips.len(), 1);
    assert!(!fips[0].is_active());
}

#[test]
fn error_statuses_are_mapped() {
    let mut server = Server::new();
    server
        .mock("DELETE", "/v2.0/agents/agent-1/l3-routers/router-9")
        .with_status(404)
        .with_body("router not hosted")
        .create();
    server
        .mock("POST", "/v2.0/agents/agent-1/l3-routers")
        .with_status(409)
        .with_body("already hosted")
        .create();
    server
        .mock("GET", "/v2.0/agents")
        .with_status(503)
        .with_body("unavailable")
        .create();

    let client = make_client(&server);

    assert!(matches!(
        client.remove_router_from_agent("agent-1", "router-9"),
        Err(ControlPlaneError::NotFound(body)) if body == "router not hosted"
    ));
    assert!(matches!(
        client.add_router_to_agent("agent-1", "router-1"),
        Err(ControlPlaneError::Rejected(_))
    ));
    assert!(matches!(
        client.list_agents(None),
        Err(ControlPlaneError::Status { status: 503, .. })
    ));
}

#[test]
fn malformed_body_is_decode_error() {
    let mut server = Server::new();
    server.mock("GET", "/v2.0/agents").with_body("not json").create();

    let err = make_client(&server).list_agents(None).unwrap_err();
    assert!(matches!(err, ControlPlaneError::Decode(_)));
}

#[test]
fn endpoint_with_path_prefix() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/network/v2.0/agents")
        .with_body(json!({ "agents": [] }).to_string())
        .create();

    let client = NetworkClient::new(ClientConfig::new(format!("{}/network", server.url()))).unwrap();
    assert!(client.list_agents(None).unwrap().is_empty());
    mock.assert();
}

#[test]
fn invalid_endpoint_rejected() {
    let err = NetworkClient::new(ClientConfig::new("not a url")).unwrap_err();
    assert!(matches!(err, ClientError::InvalidEndpoint { .. }));
}

#[test]
fn unreadable_ca_cert_rejected() {
    let config = ClientConfig {
        ca_cert: Some("/nonexistent/ca.pem".into()),
        ..ClientConfig::new("https://network.example:9696/")
    };
    assert!(matches!(
        NetworkClient::new(config),
        Err(ClientError::CaCertRead { .. })
    ));
}

#[test]
fn garbage_ca_cert_rejected() {
    let mut pem = tempfile::NamedTempFile::new().unwrap();
    write!(pem, "-----BEGIN CERTIFICATE-----\nnot base64!\n-----END CERTIFICATE-----\n").unwrap();

    let config = ClientConfig {
        ca_cert: Some(pem.path().to_path_buf()),
        ..ClientConfig::new("https://network.example:9696/")
    };
    assert!(NetworkClient::new(config).is_err());
}
