//! Agent-side relay client.
//!
//! A single task owns the scene, the connection state and the reconnect
//! counter. Everything else (the socket reader and writer, reconnect
//! timers, callers holding an [`EndpointHandle`]) talks to it through one
//! event queue, so scene operations never run concurrently.
//!
//! Socket tasks tag their events with a connection generation; events from
//! a socket that has since been replaced are dropped.

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::dispatch;
use super::state::{ConnectionState, ReconnectPolicy};
use crate::config::AgentConfig;
use crate::error::RelayError;
use crate::grammar;
use crate::scene::{SceneFacade, SceneResponse};
use crate::ws::messages::AgentMessage;

type ConnectionListener = Box<dyn Fn(bool) + Send + Sync>;

/// Events consumed by the endpoint task.
#[derive(Debug)]
enum EndpointEvent {
    Connect,
    Disconnect,
    Send(Value),
    Local {
        line: String,
        reply: oneshot::Sender<SceneResponse>,
    },
    Opened {
        generation: u64,
        writer: mpsc::UnboundedSender<Message>,
    },
    Inbound {
        generation: u64,
        text: String,
    },
    Failed {
        generation: u64,
        error: RelayError,
    },
    Closed {
        generation: u64,
    },
}

/// Cloneable handle to a running [`RelayEndpoint`].
#[derive(Debug, Clone)]
pub struct EndpointHandle {
    events: mpsc::UnboundedSender<EndpointEvent>,
    state: watch::Receiver<ConnectionState>,
}

impl EndpointHandle {
    /// Opens a socket to the relay. No-op unless currently disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the endpoint task has stopped.
    pub fn connect(&self) -> Result<(), RelayError> {
        self.post(EndpointEvent::Connect)
    }

    /// Closes the current socket, if any.
    ///
    /// The close is observed like any other, so a reconnect is scheduled
    /// while attempts remain.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the endpoint task has stopped.
    pub fn disconnect(&self) -> Result<(), RelayError> {
        self.post(EndpointEvent::Disconnect)
    }

    /// Sends a JSON payload to the relay. Dropped with a warning when the
    /// socket is not open.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the endpoint task has stopped.
    pub fn send(&self, payload: Value) -> Result<(), RelayError> {
        self.post(EndpointEvent::Send(payload))
    }

    /// Runs a grammar line against the local scene, outside any relay
    /// command. A successful change is pushed to the relay as a
    /// `state_update` when connected.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the endpoint task has stopped.
    pub async fn execute_local(&self, line: impl Into<String>) -> Result<SceneResponse, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.post(EndpointEvent::Local {
            line: line.into(),
            reply,
        })?;
        rx.await.map_err(|_| stopped())
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Returns `true` while the socket is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Waits until the endpoint reaches `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the endpoint task stops first.
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<(), RelayError> {
        let mut rx = self.state.clone();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| stopped())
    }

    fn post(&self, event: EndpointEvent) -> Result<(), RelayError> {
        self.events.send(event).map_err(|_| stopped())
    }
}

fn stopped() -> RelayError {
    RelayError::Internal("endpoint stopped".to_string())
}

/// Agent-side connection to the relay, owning the local scene.
pub struct RelayEndpoint<S> {
    relay_url: String,
    connect_timeout: Duration,
    scene: S,
    reconnect: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    generation: u64,
    writer: Option<mpsc::UnboundedSender<Message>>,
    cancel: Option<oneshot::Sender<()>>,
    events_tx: mpsc::WeakUnboundedSender<EndpointEvent>,
    events_rx: mpsc::UnboundedReceiver<EndpointEvent>,
    on_connection_change: Option<ConnectionListener>,
}

impl<S> fmt::Debug for RelayEndpoint<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayEndpoint")
            .field("relay_url", &self.relay_url)
            .field("state", &*self.state.borrow())
            .field("generation", &self.generation)
            .field("reconnect", &self.reconnect)
            .finish_non_exhaustive()
    }
}

impl<S> RelayEndpoint<S>
where
    S: SceneFacade + 'static,
{
    /// Creates an endpoint and a handle to it. Nothing connects until
    /// [`EndpointHandle::connect`] is called.
    pub fn new(config: &AgentConfig, scene: S) -> (Self, EndpointHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let endpoint = Self {
            relay_url: config.relay_url.clone(),
            connect_timeout: config.connect_timeout,
            scene,
            reconnect: ReconnectPolicy::new(
                config.reconnect_interval,
                config.max_reconnect_attempts,
            ),
            state: state_tx,
            generation: 0,
            writer: None,
            cancel: None,
            events_tx: events_tx.downgrade(),
            events_rx,
            on_connection_change: None,
        };
        let handle = EndpointHandle {
            events: events_tx,
            state: state_rx,
        };
        (endpoint, handle)
    }

    /// Registers a callback fired with `true` on every open and `false` on
    /// every close or socket error.
    #[must_use]
    pub fn on_connection_change<F>(mut self, listener: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.on_connection_change = Some(Box::new(listener));
        self
    }

    /// Spawns the endpoint task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until every [`EndpointHandle`] is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            self.handle_event(event);
        }
        self.writer = None;
        tracing::debug!("relay endpoint stopped");
    }

    fn handle_event(&mut self, event: EndpointEvent) {
        match event {
            EndpointEvent::Connect => self.open_socket(),
            EndpointEvent::Disconnect => {
                if let Some(writer) = self.writer.take() {
                    let _ = writer.send(Message::Close(None));
                } else if let Some(cancel) = self.cancel.take() {
                    // Still handshaking: abandon it, the socket task reports the close.
                    let _ = cancel.send(());
                }
            }
            EndpointEvent::Send(payload) => self.send_value(&payload),
            EndpointEvent::Local { line, reply } => {
                let response = grammar::parse_and_execute(&mut self.scene, &line);
                if response.success && self.writer.is_some() {
                    self.send_message(&AgentMessage::StateUpdate {
                        state: self.scene.snapshot(),
                    });
                }
                let _ = reply.send(response);
            }
            EndpointEvent::Opened { generation, writer } => {
                if generation != self.generation {
                    return;
                }
                tracing::info!(url = %self.relay_url, "connected to relay");
                self.writer = Some(writer);
                self.reconnect.reset();
                self.set_state(ConnectionState::Connected);
                self.notify(true);
                self.send_message(&AgentMessage::StateUpdate {
                    state: self.scene.snapshot(),
                });
            }
            EndpointEvent::Inbound { generation, text } => {
                if generation != self.generation {
                    return;
                }
                match dispatch::handle_frame(&mut self.scene, &text) {
                    Ok(replies) => {
                        for reply in &replies {
                            self.send_message(reply);
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "ignoring relay frame"),
                }
            }
            EndpointEvent::Failed { generation, error } => {
                if generation != self.generation {
                    return;
                }
                tracing::warn!(
                    url = %self.relay_url,
                    code = error.error_code(),
                    %error,
                    "relay socket error"
                );
                self.notify(false);
            }
            EndpointEvent::Closed { generation } => {
                if generation != self.generation {
                    return;
                }
                tracing::info!(url = %self.relay_url, "disconnected from relay");
                self.writer = None;
                self.cancel = None;
                self.set_state(ConnectionState::Disconnected);
                self.notify(false);
                self.schedule_reconnect();
            }
        }
    }

    fn open_socket(&mut self) {
        if *self.state.borrow() != ConnectionState::Disconnected {
            return;
        }
        self.generation += 1;
        self.set_state(ConnectionState::Connecting);

        let (cancel, cancelled) = oneshot::channel();
        self.cancel = Some(cancel);

        let socket = SocketTask {
            url: self.relay_url.clone(),
            generation: self.generation,
            connect_timeout: self.connect_timeout,
            events: self.events_tx.clone(),
        };
        tokio::spawn(socket.run(cancelled));
    }

    fn schedule_reconnect(&mut self) {
        let Some(delay) = self.reconnect.next_delay() else {
            tracing::warn!(
                max_attempts = self.reconnect.max_attempts(),
                "max reconnection attempts reached, giving up"
            );
            return;
        };
        tracing::info!(
            attempt = self.reconnect.attempts(),
            max_attempts = self.reconnect.max_attempts(),
            delay_ms = delay.as_millis(),
            "scheduling reconnect"
        );

        let events = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(events) = events.upgrade() {
                let _ = events.send(EndpointEvent::Connect);
            }
        });
    }

    fn send_message(&self, message: &AgentMessage) {
        match serde_json::to_value(message) {
            Ok(value) => self.send_value(&value),
            Err(err) => tracing::error!(error = %err, "failed to encode agent message"),
        }
    }

    fn send_value(&self, payload: &Value) {
        let Some(writer) = &self.writer else {
            tracing::warn!("not connected to relay, dropping outgoing message");
            return;
        };
        if writer.send(Message::text(payload.to_string())).is_err() {
            tracing::warn!("relay socket writer closed, dropping outgoing message");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn notify(&self, connected: bool) {
        if let Some(listener) = &self.on_connection_change {
            listener(connected);
        }
    }
}

/// One socket from handshake to close.
#[derive(Debug)]
struct SocketTask {
    url: String,
    generation: u64,
    connect_timeout: Duration,
    events: mpsc::WeakUnboundedSender<EndpointEvent>,
}

impl SocketTask {
    /// Every path ends with exactly one `Closed` event for this generation.
    /// Firing `cancelled` abandons the handshake, or closes an open socket.
    async fn run(self, mut cancelled: oneshot::Receiver<()>) {
        let generation = self.generation;
        let handshake = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()));

        let stream = tokio::select! {
            result = handshake => match result {
                Ok(Ok((stream, _response))) => Some(stream),
                Ok(Err(err)) => {
                    self.post(EndpointEvent::Failed { generation, error: err.into() });
                    None
                }
                Err(_elapsed) => {
                    let error = RelayError::Transport(format!(
                        "connect timed out after {} ms",
                        self.connect_timeout.as_millis()
                    ));
                    self.post(EndpointEvent::Failed { generation, error });
                    None
                }
            },
            _ = &mut cancelled => {
                tracing::debug!(url = %self.url, "handshake abandoned");
                None
            }
        };
        if let Some(stream) = stream {
            self.pump(stream, cancelled).await;
        }
        self.post(EndpointEvent::Closed { generation });
    }

    async fn pump(
        &self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        mut cancelled: oneshot::Receiver<()>,
    ) {
        let generation = self.generation;
        let (mut sink, mut source) = stream.split();
        let (writer, mut outbox) = mpsc::unbounded_channel::<Message>();
        self.post(EndpointEvent::Opened { generation, writer });

        let mut closing = false;
        loop {
            tokio::select! {
                _ = &mut cancelled, if !closing => {
                    closing = true;
                    if sink.send(Message::Close(None)).await.is_err() {
                        break;
                    }
                }
                frame = outbox.recv() => {
                    let Some(frame) = frame else {
                        // Endpoint dropped the writer without a close frame.
                        let _ = sink.close().await;
                        break;
                    };
                    if let Err(err) = sink.send(frame).await {
                        self.post(EndpointEvent::Failed { generation, error: err.into() });
                        break;
                    }
                }
                msg = source.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.post(EndpointEvent::Inbound { generation, text: text.to_string() });
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(err)) => {
                            self.post(EndpointEvent::Failed { generation, error: err.into() });
                            break;
                        }
                        // Ping/pong is answered by tungstenite.
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    fn post(&self, event: EndpointEvent) {
        if let Some(events) = self.events.upgrade() {
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;
    use crate::scene::InMemoryScene;

    fn config(relay_url: impl Into<String>, max_reconnect_attempts: u32) -> AgentConfig {
        AgentConfig {
            relay_url: relay_url.into(),
            reconnect_interval: Duration::from_millis(10),
            max_reconnect_attempts,
            ..AgentConfig::default()
        }
    }

    /// Port 1 on loopback refuses immediately.
    fn unreachable_config(max_reconnect_attempts: u32) -> AgentConfig {
        config("ws://127.0.0.1:1", max_reconnect_attempts)
    }

    /// A listener that accepts TCP connections and never answers the
    /// WebSocket upgrade.
    async fn stalled_relay() -> String {
        let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("ws://{addr}")
    }

    /// Counts `false` notifications from the connection callback.
    fn count_disconnects<S: SceneFacade + 'static>(
        endpoint: RelayEndpoint<S>,
    ) -> (RelayEndpoint<S>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        let endpoint = endpoint.on_connection_change(move |connected| {
            if !connected {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (endpoint, closes)
    }

    /// Waits up to two seconds for `counter` to reach `target`.
    async fn wait_for_count(counter: &AtomicUsize, target: usize) {
        let reached = tokio::time::timeout(Duration::from_secs(2), async {
            while counter.load(Ordering::SeqCst) < target {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(
            reached.is_ok(),
            "expected {target} notifications, saw {}",
            counter.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn local_commands_run_while_disconnected() {
        let (endpoint, handle) =
            RelayEndpoint::new(&AgentConfig::default(), InMemoryScene::with_seed(3));
        let _task = endpoint.spawn();

        let created = tokio_test::assert_ok!(handle.execute_local("create box a").await);
        assert!(created.success);
        let listed = tokio_test::assert_ok!(handle.execute_local("LIST").await);
        assert_eq!(listed.message, "Objects: a (box)");
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn send_while_disconnected_is_dropped() {
        let (endpoint, handle) = RelayEndpoint::new(&AgentConfig::default(), InMemoryScene::new());
        let _task = endpoint.spawn();
        tokio_test::assert_ok!(handle.send(serde_json::json!({"type": "noop"})));
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn gives_up_after_reconnect_budget() {
        let (endpoint, handle) = RelayEndpoint::new(&unreachable_config(2), InMemoryScene::new());
        let (endpoint, closes) = count_disconnects(endpoint);
        let _task = endpoint.spawn();

        tokio_test::assert_ok!(handle.connect());

        // Initial attempt plus two reconnects; each failure reports an error
        // and a close.
        wait_for_count(&closes, 6).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(closes.load(Ordering::SeqCst), 6);
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_abandons_a_stalled_handshake() {
        let url = stalled_relay().await;
        let cfg = AgentConfig {
            connect_timeout: Duration::from_secs(30),
            ..config(url, 0)
        };
        let (endpoint, handle) = RelayEndpoint::new(&cfg, InMemoryScene::new());
        let (endpoint, closes) = count_disconnects(endpoint);
        let _task = endpoint.spawn();

        tokio_test::assert_ok!(handle.connect());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.state(), ConnectionState::Connecting);

        tokio_test::assert_ok!(handle.disconnect());
        let settled = tokio::time::timeout(
            Duration::from_secs(1),
            handle.wait_for_state(ConnectionState::Disconnected),
        )
        .await;
        assert!(matches!(settled, Ok(Ok(()))), "endpoint stuck in {}", handle.state());
        wait_for_count(&closes, 1).await;

        // Connecting again is possible once the handshake is abandoned.
        tokio_test::assert_ok!(handle.connect());
        let retried = tokio::time::timeout(
            Duration::from_secs(1),
            handle.wait_for_state(ConnectionState::Connecting),
        )
        .await;
        assert!(matches!(retried, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn stalled_handshake_times_out_as_transport_error() {
        let url = stalled_relay().await;
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let socket = SocketTask {
            url,
            generation: 7,
            connect_timeout: Duration::from_millis(100),
            events: events_tx.downgrade(),
        };
        let (_cancel, cancelled) = oneshot::channel();
        socket.run(cancelled).await;

        let Some(EndpointEvent::Failed { generation, error }) = events_rx.recv().await else {
            panic!("expected a failure first");
        };
        assert_eq!(generation, 7);
        assert_eq!(
            error,
            RelayError::Transport("connect timed out after 100 ms".to_string())
        );
        assert!(matches!(
            events_rx.recv().await,
            Some(EndpointEvent::Closed { generation: 7 })
        ));
    }

    #[tokio::test]
    async fn refused_connect_is_a_transport_error() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let socket = SocketTask {
            url: "ws://127.0.0.1:1".to_string(),
            generation: 1,
            connect_timeout: Duration::from_secs(2),
            events: events_tx.downgrade(),
        };
        let (_cancel, cancelled) = oneshot::channel();
        socket.run(cancelled).await;

        let Some(EndpointEvent::Failed { error, .. }) = events_rx.recv().await else {
            panic!("expected a failure first");
        };
        assert!(matches!(error, RelayError::Transport(_)), "{error}");
        assert!(matches!(
            events_rx.recv().await,
            Some(EndpointEvent::Closed { generation: 1 })
        ));
    }

    #[tokio::test]
    async fn stopped_endpoint_reports_internal_error() {
        let (endpoint, handle) = RelayEndpoint::new(&AgentConfig::default(), InMemoryScene::new());
        drop(endpoint);
        let err = tokio_test::assert_err!(handle.connect());
        assert_eq!(err, RelayError::Internal("endpoint stopped".to_string()));
    }
}
