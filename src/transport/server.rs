//! TCP listener that turns accepted sockets into [`Connection`]s.
//!
//! The accept loop runs until a shutdown signal arrives. A failed accept is
//! logged and the loop carries on; sockets beyond `max_connections` are closed
//! on arrival. Every connection is wired to the server's subscribers, which is
//! where the [`SessionGate`] plugs in.

use crate::config::{NetworkConfig, ServerConfig};
use crate::core::alias::ConnectionId;
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::PacketRegistry;
use crate::protocol::session::SessionGate;
use crate::transport::connection::{Authentication, Connection, ConnectionContext};
use crate::transport::observer::{ConnectionObserver, Subscribers};
use crate::utils::metrics::Metrics;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{error, info, instrument, warn};

/// Pause after a failed accept so a persistent error doesn't spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Connections currently open on a server.
#[derive(Default)]
struct LiveConnections {
    connections: Mutex<HashMap<ConnectionId, Connection>>,
}

impl LiveConnections {
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn snapshot(&self) -> Vec<Connection> {
        self.lock().values().cloned().collect()
    }
}

impl ConnectionObserver for LiveConnections {
    fn on_connect(&self, connection: &Connection) {
        self.lock().insert(connection.id(), connection.clone());
    }

    fn on_disconnect(&self, connection: &Connection) {
        self.lock().remove(&connection.id());
    }
}

pub struct ServerBuilder {
    config: ServerConfig,
    registry: Arc<PacketRegistry>,
    authentication: Option<Authentication>,
    max_payload_size: Option<usize>,
    subscribers: Subscribers,
    metrics: Arc<Metrics>,
}

impl ServerBuilder {
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn authentication(mut self, authentication: Authentication) -> Self {
        self.authentication = Some(authentication);
        self
    }

    pub fn max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = Some(max_payload_size);
        self
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Hand every accepted connection to `gate` for authentication.
    pub fn session_gate(self, gate: Arc<SessionGate>) -> Self {
        self.subscribe(gate)
    }

    pub fn subscribe(mut self, observer: Arc<dyn ConnectionObserver>) -> Self {
        self.subscribers.subscribe(observer);
        self
    }

    /// Bind the listening socket.
    #[instrument(skip(self), fields(address = %self.config.address))]
    pub async fn bind(self) -> Result<Server> {
        let listener = TcpListener::bind(&self.config.address).await.map_err(|e| {
            ProtocolError::ConnectError(format!("Failed to bind {}: {e}", self.config.address))
        })?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Listening");

        let live = Arc::new(LiveConnections::default());
        let mut observers = Subscribers::new();
        observers.subscribe(live.clone());
        observers.append(self.subscribers);

        let tasks = TaskTracker::new();
        let authentication = self.authentication.unwrap_or_else(|| {
            Authentication::from_config(&NetworkConfig::default().transport)
        });
        let mut context = ConnectionContext::new(self.registry, authentication)
            .with_observer(Arc::new(observers))
            .with_metrics(self.metrics.clone())
            .with_task_tracker(tasks.clone());
        if let Some(max_payload_size) = self.max_payload_size {
            context = context.with_max_payload_size(max_payload_size);
        }

        Ok(Server {
            listener,
            local_addr,
            config: self.config,
            context,
            live,
            tasks,
            metrics: self.metrics,
        })
    }
}

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    context: ConnectionContext,
    live: Arc<LiveConnections>,
    tasks: TaskTracker,
    metrics: Arc<Metrics>,
}

impl Server {
    pub fn builder(registry: Arc<PacketRegistry>) -> ServerBuilder {
        ServerBuilder {
            config: ServerConfig::default(),
            registry,
            authentication: None,
            max_payload_size: None,
            subscribers: Subscribers::new(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Builder preloaded with the server and transport sections of `config`.
    pub fn from_config(config: &NetworkConfig, registry: Arc<PacketRegistry>) -> ServerBuilder {
        Self::builder(registry)
            .config(config.server.clone())
            .authentication(Authentication::from_config(&config.transport))
            .max_payload_size(config.transport.max_payload_size)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn connection_count(&self) -> usize {
        self.live.len()
    }

    /// Run until Ctrl+C.
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.run_with_shutdown(shutdown_rx).await
    }

    /// Run until a message arrives on `shutdown_rx` or its sender is dropped.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.local_addr))]
    pub async fn run_with_shutdown(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    self.shutdown().await;
                    return Ok(());
                }

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.admit(stream, peer),
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        if self.live.len() >= self.config.max_connections {
            self.metrics.connection_rejected();
            warn!(
                %peer,
                max_connections = self.config.max_connections,
                "Server full, closing connection"
            );
            return;
        }

        Connection::accept(stream, self.context.clone());
    }

    async fn shutdown(&self) {
        let open = self.live.snapshot();
        info!(connections = open.len(), "Shutting down server, closing connections");
        for connection in &open {
            connection.disconnect();
        }

        self.tasks.close();
        if tokio::time::timeout(self.config.shutdown_timeout, self.tasks.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.tasks.len(),
                "Shutdown timeout reached, forcing exit"
            );
        } else {
            info!("All connections closed, shutting down");
        }
        self.metrics.log_metrics();
    }
}
