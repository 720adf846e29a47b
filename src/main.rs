//! scene-relay server entry point.
//!
//! Serves the agent WebSocket and HTTP endpoints with Axum and, unless
//! disabled, the MCP tool server on stdin/stdout. Closing stdin shuts the
//! process down.

use tokio::sync::oneshot;

use scene_relay::api;
use scene_relay::app_state::AppState;
use scene_relay::config::RelayConfig;
use scene_relay::mcp::SceneToolServer;
use scene_relay::relay::RelayHub;
use scene_relay::telemetry::{self, LogFormat};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (stderr only; stdout belongs to MCP)
    telemetry::init(LogFormat::from_env());

    // Load configuration
    let config = RelayConfig::from_env()?;
    tracing::info!(
        addr = %config.listen_addr,
        timeout_ms = config.command_timeout.as_millis(),
        mcp = config.mcp_stdio_enabled,
        "starting scene-relay"
    );

    // Start the relay hub
    let relay = RelayHub::spawn(config.command_timeout, config.hub_queue_capacity);

    // Control channel
    let mcp_done = if config.mcp_stdio_enabled {
        let (done_tx, done_rx) = oneshot::channel();
        let tools = SceneToolServer::new(relay.clone());
        tokio::spawn(async move {
            if let Err(err) = tools.serve_stdio().await {
                tracing::error!(error = %err, "MCP stdio server failed");
            }
            let _ = done_tx.send(());
        });
        Some(done_rx)
    } else {
        None
    };

    // Build router
    let app = api::build_app(AppState { relay });

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(mcp_done))
        .await?;

    tracing::info!("scene-relay stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or when the MCP client goes away.
async fn shutdown_signal(mcp_done: Option<oneshot::Receiver<()>>) {
    let mcp_closed = async {
        match mcp_done {
            Some(done) => {
                let _ = done.await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("received Ctrl-C, shutting down"),
        () = mcp_closed => tracing::info!("MCP stdio closed, shutting down"),
    }
}
