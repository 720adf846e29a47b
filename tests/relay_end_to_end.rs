//! End-to-end tests: a relay on an ephemeral port, driven by real agents.

#![allow(clippy::panic, clippy::indexing_slicing, missing_docs)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use scene_relay::api;
use scene_relay::app_state::AppState;
use scene_relay::config::AgentConfig;
use scene_relay::endpoint::{ConnectionState, EndpointHandle, RelayEndpoint};
use scene_relay::error::RelayError;
use scene_relay::relay::{RelayHandle, RelayHub, RelayStatus};
use scene_relay::scene::InMemoryScene;

async fn start_relay(command_timeout: Duration) -> (SocketAddr, RelayHandle) {
    let relay = RelayHub::spawn(command_timeout, 64);
    let app = api::build_app(AppState {
        relay: relay.clone(),
    });
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, relay)
}

/// Polls the hub until `check` holds, for at most two seconds.
async fn eventually(relay: &RelayHandle, check: impl Fn(&RelayStatus) -> bool) -> RelayStatus {
    for _ in 0..200 {
        let Ok(status) = relay.status().await else {
            panic!("hub stopped");
        };
        if check(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

async fn start_agent(addr: SocketAddr, relay: &RelayHandle) -> EndpointHandle {
    let config = AgentConfig {
        relay_url: format!("ws://{addr}"),
        reconnect_interval: Duration::from_millis(50),
        max_reconnect_attempts: 3,
        ..AgentConfig::default()
    };
    let (endpoint, handle) = RelayEndpoint::new(&config, InMemoryScene::with_seed(42));
    let _task = endpoint.spawn();

    tokio_test::assert_ok!(handle.connect());
    let connected = tokio::time::timeout(
        Duration::from_secs(2),
        handle.wait_for_state(ConnectionState::Connected),
    )
    .await;
    assert!(matches!(connected, Ok(Ok(()))), "agent never connected");
    eventually(relay, |s| s.agents == 1).await;
    handle
}

/// Receives the next connection notification, for at most two seconds.
async fn next_change(changes: &mut mpsc::UnboundedReceiver<bool>) -> bool {
    let Ok(Some(connected)) = tokio::time::timeout(Duration::from_secs(2), changes.recv()).await
    else {
        panic!("no connection change reported");
    };
    connected
}

#[tokio::test]
async fn health_endpoint_reports_agents() {
    let (addr, relay) = start_relay(Duration::from_secs(1)).await;

    let Ok(response) = reqwest::get(format!("http://{addr}/health")).await else {
        panic!("health request failed");
    };
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap_or_default();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["agents"], 0);

    let _agent = start_agent(addr, &relay).await;
    let Ok(response) = reqwest::get(format!("http://{addr}/health")).await else {
        panic!("health request failed");
    };
    let body: Value = response.json().await.unwrap_or_default();
    assert_eq!(body["agents"], 1);
}

#[tokio::test]
async fn tool_commands_round_trip_through_a_real_agent() {
    let (addr, relay) = start_relay(Duration::from_secs(2)).await;
    let _agent = start_agent(addr, &relay).await;

    let created = tokio_test::assert_ok!(
        relay
            .send_command_to_agents(
                "create_object",
                json!({"shape": "box", "name": "crate", "position": {"x": 1.0, "y": 0.5, "z": -2.0}}),
            )
            .await
    );
    assert!(created.success);
    assert_eq!(created.text(), "Created box named \"crate\"");

    let selected =
        tokio_test::assert_ok!(relay.send_command_to_agents("select crate", Value::Null).await);
    assert_eq!(selected.text(), "Selected object \"crate\"");

    let listed = tokio_test::assert_ok!(relay.send_command_to_agents("list_objects", json!({})).await);
    assert_eq!(
        listed.text(),
        "Objects in scene:\n- crate (box) at (1.00, 0.50, -2.00) [SELECTED]"
    );

    let status = eventually(&relay, |s| s.snapshot.selected().is_some()).await;
    assert_eq!(status.snapshot.objects.len(), 1);
    assert_eq!(status.snapshot.objects[0].name, "crate");
    assert_eq!(status.pending, 0);
}

#[tokio::test]
async fn failed_commands_resolve_with_the_agent_message() {
    let (addr, relay) = start_relay(Duration::from_secs(2)).await;
    let _agent = start_agent(addr, &relay).await;

    let outcome =
        tokio_test::assert_ok!(relay.send_command_to_agents("delete ghost", Value::Null).await);
    assert!(!outcome.success);
    assert_eq!(outcome.text(), "Object \"ghost\" not found");

    let outcome =
        tokio_test::assert_ok!(relay.send_command_to_agents("spin ghost", Value::Null).await);
    assert_eq!(
        outcome.text(),
        "Unknown command: spin. Use: create, delete, select, or list"
    );
}

#[tokio::test]
async fn local_console_changes_reach_the_relay() {
    let (addr, relay) = start_relay(Duration::from_secs(1)).await;
    let agent = start_agent(addr, &relay).await;

    let response = tokio_test::assert_ok!(agent.execute_local("create torus ring").await);
    assert!(response.success);

    let status = eventually(&relay, |s| !s.snapshot.objects.is_empty()).await;
    assert_eq!(status.snapshot.objects[0].name, "ring");

    let Ok(response) = reqwest::get(format!("http://{addr}/scene")).await else {
        panic!("scene request failed");
    };
    let body: Value = response.json().await.unwrap_or_default();
    assert_eq!(body["objects"][0]["type"], "torus");
}

#[tokio::test]
async fn raw_agent_sees_init_and_survives_garbage() {
    let (addr, relay) = start_relay(Duration::from_secs(2)).await;
    let Ok((mut socket, _)) = connect_async(format!("ws://{addr}/ws")).await else {
        panic!("connect failed");
    };

    let Some(Ok(Message::Text(init))) = socket.next().await else {
        panic!("expected init frame");
    };
    let init: Value = serde_json::from_str(init.as_str()).unwrap_or_default();
    assert_eq!(init["type"], "init");
    assert_eq!(init["state"]["objects"], json!([]));

    tokio_test::assert_ok!(socket.send(Message::text("definitely not json")).await);
    tokio_test::assert_ok!(socket.send(Message::text(r#"{"type":"reboot"}"#)).await);

    let pending = tokio::spawn({
        let relay = relay.clone();
        async move { relay.send_command_to_agents("list", Value::Null).await }
    });

    let Some(Ok(Message::Text(frame))) = socket.next().await else {
        panic!("expected command frame");
    };
    let command: Value = serde_json::from_str(frame.as_str()).unwrap_or_default();
    assert_eq!(command["type"], "command");
    assert_eq!(command["command"], "list");

    let reply = json!({
        "type": "response",
        "id": command["id"],
        "success": true,
        "message": "",
    });
    tokio_test::assert_ok!(socket.send(Message::text(reply.to_string())).await);

    let Ok(Ok(outcome)) = pending.await else {
        panic!("command did not resolve");
    };
    assert!(outcome.success);
    assert_eq!(outcome.text(), "Command executed successfully");
}

#[tokio::test]
async fn silent_agent_times_out() {
    let (addr, relay) = start_relay(Duration::from_millis(100)).await;
    let Ok((mut socket, _)) = connect_async(format!("ws://{addr}")).await else {
        panic!("connect failed");
    };
    let Some(Ok(Message::Text(_init))) = socket.next().await else {
        panic!("expected init frame");
    };

    let err = tokio_test::assert_err!(relay.send_command_to_agents("list", Value::Null).await);
    assert_eq!(err, RelayError::CommandTimeout { timeout_ms: 100 });
    let status = eventually(&relay, |s| s.pending == 0).await;
    assert_eq!(status.agents, 1);
}

#[tokio::test]
async fn no_agents_fails_fast() {
    let (_addr, relay) = start_relay(Duration::from_secs(5)).await;
    let started = tokio::time::Instant::now();
    let err = tokio_test::assert_err!(relay.send_command_to_agents("list", Value::Null).await);
    assert_eq!(err, RelayError::NoAgents);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn disconnect_drops_the_link_and_the_agent_reconnects() {
    let (addr, relay) = start_relay(Duration::from_secs(1)).await;
    let config = AgentConfig {
        relay_url: format!("ws://{addr}"),
        reconnect_interval: Duration::from_millis(50),
        max_reconnect_attempts: 3,
        ..AgentConfig::default()
    };
    let (changes_tx, mut changes) = mpsc::unbounded_channel();
    let (endpoint, agent) = RelayEndpoint::new(&config, InMemoryScene::with_seed(7));
    let _task = endpoint
        .on_connection_change(move |connected| {
            let _ = changes_tx.send(connected);
        })
        .spawn();

    tokio_test::assert_ok!(agent.connect());
    assert!(next_change(&mut changes).await);
    eventually(&relay, |s| s.agents == 1).await;

    tokio_test::assert_ok!(agent.disconnect());
    assert!(!next_change(&mut changes).await);
    // A socket error during the close may add another `false` first.
    while !next_change(&mut changes).await {}
    assert!(agent.is_connected());
    eventually(&relay, |s| s.agents == 1).await;

    let outcome = tokio_test::assert_ok!(relay.send_command_to_agents("list", Value::Null).await);
    assert!(outcome.success);
}
