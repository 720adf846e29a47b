//! scene-agent entry point.
//!
//! Owns an in-memory scene, keeps it connected to the relay, and offers a
//! console on stdin. Lines are grammar commands (`create box a`, `list`, ...)
//! run against the local scene; `:connect`, `:disconnect` and `:status`
//! control the relay connection; `:quit` exits.

use tokio::io::{AsyncBufReadExt, BufReader};

use scene_relay::config::AgentConfig;
use scene_relay::endpoint::{EndpointHandle, RelayEndpoint};
use scene_relay::scene::InMemoryScene;
use scene_relay::telemetry::{self, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init(LogFormat::from_env());

    let config = AgentConfig::from_env();
    tracing::info!(
        url = %config.relay_url,
        reconnect_ms = config.reconnect_interval.as_millis(),
        max_attempts = config.max_reconnect_attempts,
        "starting scene-agent"
    );

    let (endpoint, handle) = RelayEndpoint::new(&config, InMemoryScene::new());
    let endpoint = endpoint.on_connection_change(|connected| {
        tracing::info!(connected, "relay connection changed");
    });
    let task = endpoint.spawn();
    handle.connect()?;

    run_console(&handle).await?;

    drop(handle);
    task.await?;
    Ok(())
}

async fn run_console(handle: &EndpointHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            ":quit" | ":exit" => break,
            ":connect" => handle.connect()?,
            ":disconnect" => handle.disconnect()?,
            ":status" => println!("{}", handle.state()),
            _ => {
                let response = handle.execute_local(line).await?;
                let mark = if response.success { "ok" } else { "error" };
                println!("{mark}: {}", response.message);
            }
        }
    }
    Ok(())
}
