//! Server builder and main server implementation.

use crate::broadcaster::SseBroadcaster;
use crate::codec::{ConnectionCodec, Inbound};
use crate::config::ServerConfig;
use crate::connection::{ConnectionId, ConnectionState, ConnectionTable};
use crate::dispatcher::{ConnectionDispatcher, Flow};
use crate::error::ServerError;
use crate::responder::ChannelResponder;
use bytes::Bytes;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use portmux_core::SseMessage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

/// Builder for configuring and creating a server.
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Creates a new server builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the bind address.
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Sets the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Sets the maximum WebSocket payload size.
    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Sets the maximum request head size.
    #[must_use]
    pub fn max_request_head(mut self, size: usize) -> Self {
        self.config.max_request_head = size;
        self
    }

    /// Sets the SSE ticker period.
    #[must_use]
    pub fn sse_interval(mut self, period: Duration) -> Self {
        self.config.sse_interval = period;
        self
    }

    /// Sets the idle logging timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Enables or disables TCP_NODELAY.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.config.tcp_nodelay = enabled;
        self
    }

    /// Sets the command/event channel capacity.
    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Builds the server and handle.
    #[must_use]
    pub fn build(self) -> (Server, ServerHandle) {
        let capacity = self.config.channel_capacity.max(1);
        let (cmd_tx, cmd_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let shutdown = CancellationToken::new();

        let server = Server {
            config: self.config,
            cmd_rx,
            event_tx,
            shutdown: shutdown.clone(),
            connections: Arc::new(ConnectionTable::new()),
            broadcaster: Arc::new(SseBroadcaster::new()),
        };

        let handle = ServerHandle {
            cmd_tx,
            shutdown,
            event_rx: Mutex::new(event_rx),
        };

        (server, handle)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The main server instance.
pub struct Server {
    config: ServerConfig,
    cmd_rx: mpsc::Receiver<ServerCommand>,
    event_tx: mpsc::Sender<ServerEvent>,
    shutdown: CancellationToken,
    connections: Arc<ConnectionTable>,
    broadcaster: Arc<SseBroadcaster>,
}

impl Server {
    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the SSE broadcaster.
    #[must_use]
    pub fn broadcaster(&self) -> Arc<SseBroadcaster> {
        Arc::clone(&self.broadcaster)
    }

    /// Returns the connection table.
    #[must_use]
    pub fn connections(&self) -> Arc<ConnectionTable> {
        Arc::clone(&self.connections)
    }

    /// Binds the configured address.
    ///
    /// # Errors
    /// Returns IO error if binding fails.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Binds and serves until shutdown.
    ///
    /// # Errors
    /// Returns `ServerError` if the server fails to start.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener until
    /// [`ServerHandle::shutdown`] is called.
    ///
    /// # Errors
    /// Returns `ServerError` if the listener address cannot be read.
    pub async fn serve(&mut self, listener: TcpListener) -> Result<(), ServerError> {
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let ticker = tokio::spawn(Arc::clone(&self.broadcaster).run_ticker(
            self.config.sse_interval,
            self.connections.shutdown_token(),
        ));

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.handle_connection(stream, addr),
                        Err(e) => tracing::error!("Accept error: {}", e),
                    }
                }

                Some(cmd) = self.cmd_rx.recv() => self.handle_command(cmd),

                _ = self.shutdown.cancelled() => {
                    tracing::info!("Server shutdown requested");
                    break;
                }
            }
        }

        self.connections.shutdown();
        if let Err(e) = ticker.await {
            tracing::warn!("SSE ticker ended abnormally: {}", e);
        }
        Ok(())
    }

    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        if self.connections.count() >= self.config.max_connections {
            tracing::warn!("Max connections reached, rejecting {}", addr);
            let _ = self.event_tx.try_send(ServerEvent::ConnectionRejected(addr));
            return;
        }

        if let Err(e) = stream.set_nodelay(self.config.tcp_nodelay) {
            tracing::warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let (id, close) = self.connections.open(addr);
        let (responder, outbound) = ChannelResponder::channel();
        let dispatcher = ConnectionDispatcher::new(
            id,
            Arc::new(responder),
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.connections),
        );

        let task = ConnectionTask {
            id,
            framed: Framed::new(
                stream,
                ConnectionCodec::new(self.config.max_request_head, self.config.max_frame_size),
            ),
            dispatcher,
            outbound,
            close,
            idle_timeout: self.config.idle_timeout.filter(|t| !t.is_zero()),
            connections: Arc::clone(&self.connections),
            event_tx: self.event_tx.clone(),
        };

        let _ = self.event_tx.try_send(ServerEvent::ConnectionOpened(id, addr));
        tracing::info!("Connection {} accepted from {}", id, addr);
        tokio::spawn(task.run());
    }

    fn handle_command(&self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::CloseConnection(id) => {
                if !self.connections.close(id) {
                    tracing::debug!("Close requested for unknown connection {}", id);
                }
            }
            ServerCommand::Broadcast(message) => {
                self.broadcaster.broadcast(&message);
            }
        }
    }
}

/// Handle for controlling the server from outside.
pub struct ServerHandle {
    cmd_tx: mpsc::Sender<ServerCommand>,
    shutdown: CancellationToken,
    event_rx: Mutex<mpsc::Receiver<ServerEvent>>,
}

impl ServerHandle {
    /// Requests server shutdown.
    ///
    /// Never lost to a full command queue; repeated calls are harmless.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Closes a specific connection.
    pub fn close_connection(&self, id: ConnectionId) {
        self.send(ServerCommand::CloseConnection(id));
    }

    /// Broadcasts an SSE message to all subscribers.
    pub fn broadcast(&self, message: SseMessage) {
        self.send(ServerCommand::Broadcast(message));
    }

    fn send(&self, cmd: ServerCommand) {
        if let Err(e) = self.cmd_tx.try_send(cmd) {
            tracing::warn!("Server command dropped: {}", e);
        }
    }

    /// Polls for server events without waiting.
    pub fn poll_events(&self) -> impl Iterator<Item = ServerEvent> + '_ {
        std::iter::from_fn(|| self.event_rx.lock().try_recv().ok())
    }

    /// Waits for the next server event.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.event_rx.get_mut().recv().await
    }
}

/// Commands that can be sent to the server.
#[derive(Debug)]
pub enum ServerCommand {
    /// Close a specific connection.
    CloseConnection(ConnectionId),
    /// Broadcast an SSE message to all subscribers.
    Broadcast(SseMessage),
}

/// Events emitted by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A connection was accepted.
    ConnectionOpened(ConnectionId, SocketAddr),
    /// A connection was refused because the server is full.
    ConnectionRejected(SocketAddr),
    /// A connection joined the SSE registry.
    SseSubscribed(ConnectionId),
    /// A connection was closed.
    ConnectionClosed(ConnectionId),
    /// An error occurred.
    Error(String),
}

/// Drives one accepted socket.
struct ConnectionTask {
    id: ConnectionId,
    framed: Framed<TcpStream, ConnectionCodec>,
    dispatcher: ConnectionDispatcher,
    outbound: mpsc::UnboundedReceiver<Bytes>,
    close: CancellationToken,
    idle_timeout: Option<Duration>,
    connections: Arc<ConnectionTable>,
    event_tx: mpsc::Sender<ServerEvent>,
}

impl ConnectionTask {
    async fn run(mut self) {
        let id = self.id;
        if let Err(e) = self.serve().await {
            tracing::error!("Connection {} error: {}", id, e);
            let _ = self
                .event_tx
                .try_send(ServerEvent::Error(format!("connection {id}: {e}")));
        }

        self.dispatcher.on_close();
        match self.connections.remove(id) {
            Some(info) => tracing::info!(
                "Connection {} from {} closed after {}ms",
                id,
                info.peer_addr,
                (Utc::now() - info.created_at).num_milliseconds()
            ),
            None => tracing::info!("Connection {} closed", id),
        }
        let _ = self.event_tx.try_send(ServerEvent::ConnectionClosed(id));
    }

    async fn serve(&mut self) -> Result<(), ServerError> {
        let idle_period = self.idle_timeout.unwrap_or(Duration::from_secs(3600));
        let idle = tokio::time::sleep(idle_period);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                result = self.framed.next() => {
                    match result {
                        Some(Ok(inbound)) => {
                            self.connections.touch(self.id);
                            idle.as_mut().reset(Instant::now() + idle_period);
                            if self.on_inbound(inbound) == Flow::Close {
                                return self.finish().await;
                            }
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!("Connection {} disconnected", self.id);
                            return Ok(());
                        }
                    }
                }

                Some(bytes) = self.outbound.recv() => {
                    self.framed.send(bytes).await?;
                }

                _ = self.close.cancelled() => {
                    tracing::info!("Connection {} closed by server", self.id);
                    return self.finish().await;
                }

                _ = &mut idle, if self.idle_timeout.is_some() => {
                    // Logged only; the connection stays open.
                    tracing::info!("Connection {} idle for {:?}", self.id, idle_period);
                    idle.as_mut().reset(Instant::now() + idle_period);
                }
            }
        }
    }

    fn on_inbound(&mut self, inbound: Inbound) -> Flow {
        let was_subscribed = self.dispatcher.state() == ConnectionState::SseSubscribed;
        let flow = self.dispatcher.dispatch(inbound);

        if flow == Flow::Upgrade {
            self.framed.codec_mut().upgrade();
        }
        if !was_subscribed && self.dispatcher.state() == ConnectionState::SseSubscribed {
            let _ = self.event_tx.try_send(ServerEvent::SseSubscribed(self.id));
        }
        flow
    }

    /// Writes everything still queued, then shuts the socket down.
    async fn finish(&mut self) -> Result<(), ServerError> {
        while let Ok(bytes) = self.outbound.try_recv() {
            self.framed.feed(bytes).await?;
        }
        SinkExt::<Bytes>::close(&mut self.framed).await?;
        Ok(())
    }
}
