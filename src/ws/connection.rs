//! Per-agent WebSocket read/write loop.
//!
//! The connection owns nothing but its socket. Inbound text frames go to the
//! relay hub as-is; frames queued by the hub are written out in order.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::relay::RelayHandle;

/// Runs the read/write loop for a single agent connection.
///
/// - Registers the agent with the hub (which queues the `init` frame).
/// - Forwards incoming text frames to the hub.
/// - Writes frames the hub queues for this agent.
/// - Unregisters the agent when either side closes.
pub async fn run_connection(socket: WebSocket, relay: RelayHandle) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let agent = match relay.agent_connected(out_tx).await {
        Ok(agent) => agent,
        Err(err) => {
            tracing::error!(error = %err, "rejecting agent connection");
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            // Incoming frame from the agent
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if relay.inbound(agent, text.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::warn!(%agent, error = %err, "agent socket error");
                        break;
                    }
                    // Binary frames carry nothing we understand; ping/pong
                    // is answered by axum.
                    Some(Ok(_)) => {}
                }
            }
            // Frame queued by the hub
            frame = out_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if ws_tx.send(Message::text(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = relay.agent_disconnected(agent).await;
    tracing::debug!(%agent, "agent connection closed");
}
