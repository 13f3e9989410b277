//! One duplex packet connection over a TCP stream.
//!
//! A [`Connection`] owns its socket, an unbounded FIFO outbound queue and two
//! background tasks:
//!
//! ```text
//!  send(packet) ──► [outbound queue] ──► send loop ──► seal ──► encode ──► socket
//!                                                                            │
//!  on_receive ◄── registry.resolve ◄── open (token check) ◄── decode ◄── receive loop
//! ```
//!
//! Either loop may detect a failure first and request teardown, so
//! [`Connection::disconnect`] is idempotent: the first caller flips the state,
//! notifies the observer and cancels both loops; every later call is a no-op.
//! Cancellation is how blocked loops are released: the receive loop stops
//! waiting on the socket and the send loop stops waiting on the queue or on a
//! stalled write, and dropping their socket halves closes the stream.
//!
//! Dropping a `Connection` handle does not close it; call `disconnect`.

use crate::config::{AuthenticationMode, ClientConfig, TransportConfig, MAX_PAYLOAD_SIZE};
use crate::core::alias::{ConnectionId, SourceId};
use crate::core::codec::{Envelope, EnvelopeCodec};
use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::registry::PacketRegistry;
use crate::transport::observer::{ConnectionObserver, Subscribers};
use crate::utils::crypto::XChaChaCipher;
use crate::utils::metrics::Metrics;
use crate::utils::timeout::with_timeout_error;
use crate::utils::token::TokenAuthority;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Envelope authentication for a connection.
#[derive(Clone)]
pub enum Authentication {
    /// Every envelope carries a fresh encrypted token
    Token(TokenAuthority),
    /// Plain framing; received packets carry no proven source
    None,
}

impl Authentication {
    pub fn from_config(config: &TransportConfig) -> Self {
        match config.authentication {
            AuthenticationMode::Token => Self::Token(TokenAuthority::new(
                Arc::new(XChaChaCipher::from_passphrase(&config.cipher_key)),
                config.token_freshness,
            )),
            AuthenticationMode::None => Self::None,
        }
    }

    pub fn mode(&self) -> AuthenticationMode {
        match self {
            Self::Token(_) => AuthenticationMode::Token,
            Self::None => AuthenticationMode::None,
        }
    }
}

/// Everything a connection shares with its siblings: the packet registry,
/// framing, observers and metrics.
#[derive(Clone)]
pub struct ConnectionContext {
    registry: Arc<PacketRegistry>,
    authentication: Authentication,
    observer: Arc<dyn ConnectionObserver>,
    metrics: Arc<Metrics>,
    max_payload_size: usize,
    local_identity: Option<SourceId>,
    tasks: TaskTracker,
}

impl ConnectionContext {
    pub fn new(registry: Arc<PacketRegistry>, authentication: Authentication) -> Self {
        Self {
            registry,
            authentication,
            observer: Arc::new(Subscribers::new()),
            metrics: Arc::new(Metrics::new()),
            max_payload_size: MAX_PAYLOAD_SIZE,
            local_identity: None,
            tasks: TaskTracker::new(),
        }
    }

    pub fn from_config(registry: Arc<PacketRegistry>, config: &TransportConfig) -> Self {
        Self::new(registry, Authentication::from_config(config))
            .with_max_payload_size(config.max_payload_size)
    }

    pub fn with_observer(mut self, observer: Arc<dyn ConnectionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// Identity stamped into tokens for packets that carry no source of their own.
    pub fn with_local_identity(mut self, identity: SourceId) -> Self {
        self.local_identity = Some(identity);
        self
    }

    /// Track connection loops on `tasks` so their owner can wait for them.
    pub fn with_task_tracker(mut self, tasks: TaskTracker) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn registry(&self) -> &Arc<PacketRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn authentication(&self) -> &Authentication {
        &self.authentication
    }

    pub fn codec(&self) -> EnvelopeCodec {
        EnvelopeCodec::new(self.authentication.mode()).with_max_payload_size(self.max_payload_size)
    }

    /// Wrap an outbound packet, minting a new token for it under token framing.
    pub fn seal(&self, packet: &Packet) -> Result<Envelope> {
        let token = match &self.authentication {
            Authentication::Token(authority) => {
                Some(authority.mint(packet.source().or(self.local_identity))?)
            }
            Authentication::None => None,
        };

        Ok(Envelope {
            token,
            alias: packet.alias(),
            payload: packet.payload().clone(),
        })
    }

    /// Verify an inbound envelope and rebuild its typed packet.
    pub fn open(&self, envelope: Envelope) -> Result<Packet> {
        let source = match (&self.authentication, envelope.token.as_deref()) {
            (Authentication::Token(authority), Some(token)) => authority.verify(token)?.source,
            (Authentication::Token(_), None) => {
                return Err(ProtocolError::InvalidToken(constants::ERR_MISSING_TOKEN.into()))
            }
            (Authentication::None, _) => None,
        };

        self.registry.resolve(envelope.alias, source, envelope.payload)
    }
}

struct Inner {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    outbound: mpsc::UnboundedSender<Packet>,
    connected: AtomicBool,
    shutdown: CancellationToken,
    context: ConnectionContext,
}

/// Cheaply clonable handle to one live (or closed) connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Open a client connection to `addr` and start its loops.
    #[instrument(skip(context))]
    pub async fn connect(
        addr: &str,
        context: ConnectionContext,
        connection_timeout: Duration,
    ) -> Result<Self> {
        let stream = with_timeout_error(
            async {
                TcpStream::connect(addr)
                    .await
                    .map_err(|e| ProtocolError::ConnectError(e.to_string()))
            },
            connection_timeout,
        )
        .await
        .map_err(|e| match e {
            ProtocolError::Timeout => {
                ProtocolError::ConnectError(constants::ERR_CONNECT_TIMEOUT.into())
            }
            other => other,
        })?;

        Ok(Self::start(stream, context))
    }

    /// Connect to the configured server address.
    pub async fn connect_with_config(config: &ClientConfig, context: ConnectionContext) -> Result<Self> {
        Self::connect(&config.address, context, config.connection_timeout).await
    }

    /// Wrap an accepted socket and start its loops.
    pub fn accept(stream: TcpStream, context: ConnectionContext) -> Self {
        Self::start(stream, context)
    }

    fn start(stream: TcpStream, context: ConnectionContext) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to disable Nagle's algorithm");
        }
        let peer_addr = stream.peer_addr().ok();
        let codec = context.codec();
        let (reader, writer) = stream.into_split();
        let (outbound, queue) = mpsc::unbounded_channel();

        let connection = Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                peer_addr,
                outbound,
                connected: AtomicBool::new(true),
                shutdown: CancellationToken::new(),
                context,
            }),
        };

        connection.inner.context.metrics.connection_established();
        info!(connection = %connection.id(), peer = ?peer_addr, "Connection opened");
        connection.inner.context.observer.on_connect(&connection);

        let tasks = &connection.inner.context.tasks;
        tasks.spawn(send_loop(
            connection.clone(),
            FramedWrite::new(writer, codec),
            queue,
        ));
        tasks.spawn(receive_loop(connection.clone(), FramedRead::new(reader, codec)));

        connection
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    /// Advisory: may be stale as soon as it returns.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Queue a packet for transmission. Never waits on the socket.
    ///
    /// Packets queued on one connection are written in queue order.
    pub fn send(&self, packet: Packet) -> Result<()> {
        if !self.is_connected() {
            return Err(ProtocolError::ConnectionClosed);
        }
        let size = packet.payload().len();
        if size > self.inner.context.max_payload_size {
            return Err(ProtocolError::OversizedPacket(size));
        }

        self.inner
            .outbound
            .send(packet)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Close the connection. Safe to call any number of times from any task;
    /// only the first call notifies the observer and stops the loops.
    pub fn disconnect(&self) {
        if self
            .inner
            .connected
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.inner.context.metrics.connection_closed();
        info!(connection = %self.id(), peer = ?self.peer_addr(), "Connection closed");
        self.inner.context.observer.on_disconnect(self);
        self.inner.shutdown.cancel();
    }

    /// Resolves once the connection has been disconnected and its observer notified.
    pub async fn closed(&self) {
        self.inner.shutdown.cancelled().await;
    }

    async fn transmit(
        &self,
        sink: &mut FramedWrite<OwnedWriteHalf, EnvelopeCodec>,
        packet: &Packet,
    ) -> Result<()> {
        let envelope = self.inner.context.seal(packet)?;
        sink.send(envelope).await?;

        let size = packet.payload().len();
        self.inner.context.metrics.packet_sent(size as u64);
        debug!(connection = %self.id(), alias = %packet.alias(), size, "Packet sent");
        self.inner.context.observer.on_send(self, packet);
        Ok(())
    }

    fn deliver(&self, envelope: Envelope) -> Result<()> {
        let packet = self.inner.context.open(envelope)?;

        let size = packet.payload().len();
        self.inner.context.metrics.packet_received(size as u64);
        debug!(connection = %self.id(), alias = %packet.alias(), size, "Packet received");
        self.inner.context.observer.on_receive(self, &packet);
        Ok(())
    }
}

async fn send_loop(
    connection: Connection,
    mut sink: FramedWrite<OwnedWriteHalf, EnvelopeCodec>,
    mut queue: mpsc::UnboundedReceiver<Packet>,
) {
    let shutdown = connection.inner.shutdown.clone();

    loop {
        let packet = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = queue.recv() => match next {
                Some(packet) => packet,
                None => break,
            },
        };

        let sent = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            sent = connection.transmit(&mut sink, &packet) => sent,
        };

        if let Err(e) = sent {
            warn!(connection = %connection.id(), alias = %packet.alias(), error = %e, "Send failed");
            break;
        }
    }

    if let Err(e) = sink.get_mut().shutdown().await {
        debug!(connection = %connection.id(), error = %e, "Failed to close transport cleanly");
    }
    connection.disconnect();
}

async fn receive_loop(connection: Connection, mut stream: FramedRead<OwnedReadHalf, EnvelopeCodec>) {
    let shutdown = connection.inner.shutdown.clone();

    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            frame = stream.next() => frame,
        };

        let result = match frame {
            Some(Ok(envelope)) => connection.deliver(envelope),
            Some(Err(e)) => Err(e),
            None => {
                debug!(connection = %connection.id(), "Peer closed the stream");
                break;
            }
        };

        match result {
            Ok(()) => {}
            Err(ProtocolError::Io(e)) => {
                debug!(connection = %connection.id(), error = %e, "Transport read failed");
                break;
            }
            Err(e) => {
                connection.inner.context.metrics.decode_error();
                warn!(connection = %connection.id(), error = %e, "Rejected inbound envelope");
                break;
            }
        }
    }

    connection.disconnect();
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("peer_addr", &self.inner.peer_addr)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Connection {}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}
