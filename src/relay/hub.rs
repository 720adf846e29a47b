//! Relay hub: the single task that owns all relay state.
//!
//! WebSocket connections, the tool adapter, and request timers never touch
//! the agent registry, pending map, or cached snapshot directly. They post
//! [`HubEvent`]s through a [`RelayHandle`] and the hub applies them one at a
//! time, in arrival order.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::pending::{Completion, PendingRequests};
use super::registry::{AgentRegistry, AgentSender};
use super::{CommandOutcome, RelayStatus};
use crate::domain::{AgentId, CorrelationId, SceneSnapshot};
use crate::error::RelayError;
use crate::ws::messages::{AgentMessage, ServerMessage};

/// Events consumed by the hub loop.
#[derive(Debug)]
pub enum HubEvent {
    /// An agent socket finished its upgrade.
    AgentConnected {
        /// Relay-assigned connection id.
        agent: AgentId,
        /// Queue drained by the connection's writer.
        outbound: AgentSender,
    },
    /// An agent socket closed.
    AgentDisconnected {
        /// Connection that went away.
        agent: AgentId,
    },
    /// A text frame arrived from an agent.
    Inbound {
        /// Sending connection.
        agent: AgentId,
        /// Raw frame contents.
        text: String,
    },
    /// The tool adapter wants a command executed.
    SendCommand {
        /// Tool name or grammar line.
        command: String,
        /// Structured arguments.
        params: serde_json::Value,
        /// Where the outcome goes.
        completion: Completion,
    },
    /// A request deadline elapsed.
    TimerFired {
        /// Request whose timer fired.
        id: CorrelationId,
    },
    /// Someone wants a status snapshot.
    Status {
        /// Where the status goes.
        reply: oneshot::Sender<RelayStatus>,
    },
}

/// Cloneable handle for posting events to a running [`RelayHub`].
#[derive(Debug, Clone)]
pub struct RelayHandle {
    events: mpsc::Sender<HubEvent>,
}

impl RelayHandle {
    /// Sends `command` to every connected agent and waits for the first
    /// matching response.
    ///
    /// # Errors
    ///
    /// - [`RelayError::NoAgents`] immediately if no agent is connected.
    /// - [`RelayError::CommandTimeout`] if no response arrives in time.
    /// - [`RelayError::Internal`] if the hub has stopped.
    pub async fn send_command_to_agents(
        &self,
        command: impl Into<String>,
        params: serde_json::Value,
    ) -> Result<CommandOutcome, RelayError> {
        let (completion, outcome) = oneshot::channel();
        self.post(HubEvent::SendCommand {
            command: command.into(),
            params,
            completion,
        })
        .await?;
        outcome.await.map_err(|_| hub_stopped())?
    }

    /// Registers a new agent connection and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the hub has stopped.
    pub async fn agent_connected(&self, outbound: AgentSender) -> Result<AgentId, RelayError> {
        let agent = AgentId::new();
        self.post(HubEvent::AgentConnected { agent, outbound })
            .await?;
        Ok(agent)
    }

    /// Unregisters an agent connection.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the hub has stopped.
    pub async fn agent_disconnected(&self, agent: AgentId) -> Result<(), RelayError> {
        self.post(HubEvent::AgentDisconnected { agent }).await
    }

    /// Hands a text frame from `agent` to the hub.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the hub has stopped.
    pub async fn inbound(&self, agent: AgentId, text: String) -> Result<(), RelayError> {
        self.post(HubEvent::Inbound { agent, text }).await
    }

    /// Returns agent count, pending count, and cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the hub has stopped.
    pub async fn status(&self) -> Result<RelayStatus, RelayError> {
        let (reply, status) = oneshot::channel();
        self.post(HubEvent::Status { reply }).await?;
        status.await.map_err(|_| hub_stopped())
    }

    async fn post(&self, event: HubEvent) -> Result<(), RelayError> {
        self.events.send(event).await.map_err(|_| hub_stopped())
    }
}

fn hub_stopped() -> RelayError {
    RelayError::Internal("relay hub stopped".to_string())
}

/// Owner of the agent registry, pending requests, and scene snapshot.
#[derive(Debug)]
pub struct RelayHub {
    agents: AgentRegistry,
    pending: PendingRequests,
    snapshot: SceneSnapshot,
    command_timeout: Duration,
    events_rx: mpsc::Receiver<HubEvent>,
    timer_tx: mpsc::WeakSender<HubEvent>,
}

impl RelayHub {
    /// Creates a hub and the handle used to reach it.
    ///
    /// The hub does nothing until [`RelayHub::run`] is polled; it stops
    /// once every [`RelayHandle`] has been dropped.
    #[must_use]
    pub fn new(command_timeout: Duration, queue_capacity: usize) -> (Self, RelayHandle) {
        let (events_tx, events_rx) = mpsc::channel(queue_capacity.max(1));
        let hub = Self {
            agents: AgentRegistry::new(),
            pending: PendingRequests::new(),
            snapshot: SceneSnapshot::default(),
            command_timeout,
            events_rx,
            timer_tx: events_tx.downgrade(),
        };
        (hub, RelayHandle { events: events_tx })
    }

    /// Creates a hub and spawns its loop on the current runtime.
    #[must_use]
    pub fn spawn(command_timeout: Duration, queue_capacity: usize) -> RelayHandle {
        let (hub, handle) = Self::new(command_timeout, queue_capacity);
        tokio::spawn(hub.run());
        handle
    }

    /// Processes events until every handle is dropped.
    pub async fn run(mut self) {
        tracing::debug!("relay hub started");
        while let Some(event) = self.events_rx.recv().await {
            self.handle_event(event);
        }
        tracing::debug!("relay hub stopped");
    }

    fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::AgentConnected { agent, outbound } => self.on_agent_connected(agent, outbound),
            HubEvent::AgentDisconnected { agent } => {
                if self.agents.remove(agent) {
                    tracing::info!(%agent, agents = self.agents.len(), "agent disconnected");
                }
            }
            HubEvent::Inbound { agent, text } => self.on_inbound(agent, &text),
            HubEvent::SendCommand {
                command,
                params,
                completion,
            } => self.on_send_command(command, params, completion),
            HubEvent::TimerFired { id } => {
                self.pending.expire(id, self.command_timeout);
            }
            HubEvent::Status { reply } => {
                let _ = reply.send(RelayStatus {
                    agents: self.agents.len(),
                    pending: self.pending.len(),
                    snapshot: self.snapshot.clone(),
                });
            }
        }
    }

    fn on_agent_connected(&mut self, agent: AgentId, outbound: AgentSender) {
        self.agents.insert(agent, outbound);
        tracing::info!(%agent, agents = self.agents.len(), "agent connected");

        let init = ServerMessage::Init {
            state: self.snapshot.clone(),
        };
        match init.encode() {
            Ok(frame) => {
                if !self.agents.send_to(agent, frame) {
                    tracing::warn!(%agent, "agent closed before init was queued");
                    self.agents.remove(agent);
                }
            }
            Err(err) => tracing::error!(%agent, error = %err, "failed to encode init"),
        }
    }

    fn on_inbound(&mut self, agent: AgentId, text: &str) {
        match AgentMessage::decode(text) {
            Ok(AgentMessage::Response {
                id,
                success,
                message,
                result,
            }) => {
                let outcome = CommandOutcome {
                    success,
                    message,
                    result,
                };
                if !self.pending.resolve(id, outcome) {
                    tracing::debug!(%agent, %id, "ignoring response for unknown or expired request");
                }
            }
            Ok(AgentMessage::StateUpdate { state }) => {
                tracing::debug!(%agent, objects = state.objects.len(), "scene snapshot replaced");
                self.snapshot = state;
            }
            Err(err) => {
                tracing::warn!(%agent, error = %err, "dropping agent message");
            }
        }
    }

    fn on_send_command(
        &mut self,
        command: String,
        params: serde_json::Value,
        completion: Completion,
    ) {
        if self.agents.is_empty() {
            let _ = completion.send(Err(RelayError::NoAgents));
            return;
        }

        let id = CorrelationId::new();
        let frame = match (ServerMessage::Command {
            id,
            command: command.clone(),
            params,
        })
        .encode()
        {
            Ok(frame) => frame,
            Err(err) => {
                let _ = completion.send(Err(err));
                return;
            }
        };

        if let Err((err, completion)) = self.pending.insert(id, completion, self.command_timeout)
        {
            let _ = completion.send(Err(err));
            return;
        }

        let delivered = self.agents.broadcast(&frame);
        tracing::debug!(%id, command = %command, delivered, "command broadcast");
        self.arm_timer(id);
    }

    fn arm_timer(&self, id: CorrelationId) {
        let timer_tx = self.timer_tx.clone();
        let timeout = self.command_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(tx) = timer_tx.upgrade() {
                let _ = tx.send(HubEvent::TimerFired { id }).await;
            }
        });
    }
}
