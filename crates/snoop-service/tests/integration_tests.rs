//! Integration tests for the snoop-service registry.
//!
//! The binary test starts `snoop-service` the way a launcher would and reads
//! the announced port. The remaining tests run the server in-process on an
//! ephemeral port and talk to it over real WebSocket and HTTP connections.

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use snoop_client::{AgentConfig, HeartbeatAgent, ServiceClient, WsTransport};
use snoop_core::{ClientRegistry, ServiceDescriptor, SnoopError};
use snoop_service::{start_server, ServerHandle, ServerOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_tungstenite::tungstenite::Message;

const SVC_A_JSON: &str =
    r#"{"serviceName":"svc-a","serviceHome":"10.0.0.1:8080","serviceRoot":"api/"}"#;

async fn start_test_server() -> (ServerHandle, Arc<ClientRegistry>) {
    let registry = Arc::new(ClientRegistry::new());
    let handle = start_server(registry.clone(), "127.0.0.1", 0, ServerOptions::default())
        .await
        .expect("Failed to start server");
    (handle, registry)
}

/// GET a lookup path and return the status code and JSON body.
async fn get_json(addr: SocketAddr, path: &str) -> (u16, Value) {
    let response = reqwest::Client::new()
        .get(format!("http://{}/{}", addr, path))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("request failed");
    let status = response.status().as_u16();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

/// Poll `path` until it answers with `expected` status.
async fn wait_for_status(addr: SocketAddr, path: &str, expected: u16) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        if get_json(addr, path).await.0 == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn open_channel(
    addr: SocketAddr,
    path: &str,
) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    let (stream, _) = tokio_tungstenite::connect_async(format!("ws://{}/{}", addr, path))
        .await
        .expect("WebSocket connect failed");
    stream
}

struct ServiceProcess {
    child: tokio::process::Child,
    port: u16,
}

impl Drop for ServiceProcess {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

async fn start_service_binary() -> Result<ServiceProcess, String> {
    let binary = std::env::var("CARGO_BIN_EXE_snoop-service")
        .map(PathBuf::from)
        .map_err(|_| "CARGO_BIN_EXE_snoop-service not set".to_string())?;

    let mut child = tokio::process::Command::new(&binary)
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg("0")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn {}: {}", binary.display(), e))?;

    let stdout = child.stdout.take().ok_or("no stdout")?;
    let mut lines = tokio::io::BufReader::new(stdout).lines();

    let read_port = async {
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(port) = line.strip_prefix("SNOOP_PORT=") {
                return port.trim().parse::<u16>().ok();
            }
        }
        None
    };

    let port = tokio::time::timeout(Duration::from_secs(30), read_port)
        .await
        .map_err(|_| "timed out waiting for SNOOP_PORT".to_string())?
        .ok_or("service exited without announcing its port")?;

    Ok(ServiceProcess { child, port })
}

#[tokio::test]
async fn test_binary_announces_port_and_is_healthy() {
    let service = start_service_binary().await.expect("service failed to start");
    let addr: SocketAddr = format!("127.0.0.1:{}", service.port).parse().unwrap();

    assert!(wait_for_status(addr, "health", 200).await);
    let (_, body) = get_json(addr, "health").await;
    assert_eq!(body["status"], "ok");

    let (status, body) = get_json(addr, "api/services").await;
    assert_eq!(status, 200);
    assert_eq!(body, Value::Array(vec![]));
}

#[tokio::test]
async fn test_register_over_channel_then_lookup() {
    let (server, _registry) = start_test_server().await;
    let addr = server.addr();

    let mut channel = open_channel(addr, "snoop").await;
    channel
        .send(Message::Text(SVC_A_JSON.to_string()))
        .await
        .unwrap();

    assert!(wait_for_status(addr, "api/services/svc-a", 200).await);
    let (_, body) = get_json(addr, "api/services/svc-a").await;
    assert_eq!(body["serviceName"], "svc-a");
    assert_eq!(body["serviceHome"], "10.0.0.1:8080");
    assert_eq!(body["serviceRoot"], "api/");

    let (_, clients) = get_json(addr, "api/clients").await;
    assert_eq!(clients, serde_json::json!(["svc-a"]));
}

#[tokio::test]
async fn test_empty_heartbeat_deregisters_and_closes_channel() {
    let (server, registry) = start_test_server().await;
    let addr = server.addr();

    let mut channel = open_channel(addr, "snoopstatus/svc-a").await;
    channel
        .send(Message::Text(SVC_A_JSON.to_string()))
        .await
        .unwrap();
    assert!(wait_for_status(addr, "api/services/svc-a", 200).await);

    channel.send(Message::Text(String::new())).await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), channel.next())
        .await
        .expect("no close frame from server");
    assert!(matches!(reply, Some(Ok(Message::Close(_))) | None));

    assert!(wait_for_status(addr, "api/services/svc-a", 404).await);
    assert!(registry.all_descriptors().is_empty());
}

#[tokio::test]
async fn test_heartbeat_for_other_identity_is_ignored() {
    let (server, registry) = start_test_server().await;
    let addr = server.addr();

    let mut channel = open_channel(addr, "snoopstatus/svc-a").await;
    let svc_b = r#"{"serviceName":"svc-b","serviceHome":"10.0.0.2:8080","serviceRoot":"api/"}"#;
    channel.send(Message::Text(svc_b.to_string())).await.unwrap();
    channel
        .send(Message::Text(SVC_A_JSON.to_string()))
        .await
        .unwrap();

    assert!(wait_for_status(addr, "api/services/svc-a", 200).await);
    assert!(registry.get_descriptor("svc-b").is_none());
}

#[tokio::test]
async fn test_malformed_message_keeps_channel_open() {
    let (server, _registry) = start_test_server().await;
    let addr = server.addr();

    let mut channel = open_channel(addr, "snoop").await;
    channel
        .send(Message::Text("{not json".to_string()))
        .await
        .unwrap();
    channel
        .send(Message::Text(r#"{"serviceName":"","serviceHome":"h","serviceRoot":""}"#.to_string()))
        .await
        .unwrap();
    channel
        .send(Message::Text(SVC_A_JSON.to_string()))
        .await
        .unwrap();

    assert!(wait_for_status(addr, "api/services/svc-a", 200).await);
}

#[tokio::test]
async fn test_unknown_service_is_not_found_with_json_error() {
    let (server, _registry) = start_test_server().await;

    let (status, body) = get_json(server.addr(), "api/services/nope").await;
    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_agent_registers_and_deregisters_end_to_end() {
    let (server, _registry) = start_test_server().await;
    let registry_url = format!("http://{}/", server.addr());

    let config = AgentConfig::new(registry_url.clone())
        .identity("svc-a")
        .home("10.0.0.1:8080")
        .root("api/")
        .heartbeat_period(Duration::from_millis(200));
    let agent = HeartbeatAgent::start_if_enabled(&config, Arc::new(WsTransport::new()))
        .unwrap()
        .expect("agent is enabled");

    let client = ServiceClient::new(&registry_url, "svc-a").unwrap();
    let start = std::time::Instant::now();
    let descriptor = loop {
        match client.descriptor().await {
            Ok(descriptor) => break descriptor,
            Err(_) if start.elapsed() < Duration::from_secs(5) => {
                tokio::time::sleep(Duration::from_millis(50)).await
            }
            Err(e) => panic!("service never became visible: {}", e),
        }
    };
    assert_eq!(descriptor, ServiceDescriptor::new("svc-a", "10.0.0.1:8080", "api/"));
    assert_eq!(
        client.service_root().await.unwrap().as_str(),
        "http://10.0.0.1:8080/api/"
    );

    // Let a few heartbeats flow over the cached channel.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(agent.stats().heartbeats >= 2);
    assert_eq!(agent.stats().failures, 0);

    agent.shutdown().await;

    assert!(wait_for_status(server.addr(), "api/services/svc-a", 404).await);
    assert!(matches!(
        client.descriptor().await,
        Err(SnoopError::NotFound { .. })
    ));
    assert!(client.list_services().await.unwrap().is_empty());
}
