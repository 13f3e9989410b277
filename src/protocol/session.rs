//! Server-side authentication gate.
//!
//! # State Machine
//!
//! ```text
//!            accept                 hello
//!   ──────────────► AwaitingHello ─────────► Authenticated ──► dispatch
//!                     │        │                   │
//!      other packet   │        │ hello timeout     │ disconnect
//!                     ▼        ▼                   ▼
//!                    ┌──────────────────────────────┐
//!                    │            Closed            │
//!                    └──────────────────────────────┘
//! ```
//!
//! Every accepted connection starts in `AwaitingHello` with a one-shot timer
//! armed. The first inbound packet decides: a hello carrying an identity
//! authenticates the connection and disarms the timer; anything else closes it
//! without being dispatched. Once authenticated, every packet is dispatched,
//! including later hellos. A timer that fires while the connection is still
//! waiting closes it. Disconnecting for any reason drops the session entry and
//! disarms a pending timer, so a timer can never act on a later session.
//!
//! The gate is a [`ConnectionObserver`]; subscribe it to the server.

use crate::core::alias::{ConnectionId, SourceId};
use crate::core::packet::{hello_packet, Packet};
use crate::protocol::dispatcher::{DispatchContext, PacketDispatcher};
use crate::transport::connection::Connection;
use crate::transport::observer::ConnectionObserver;
use crate::utils::metrics::Metrics;
use crate::utils::timeout::HELLO_TIMEOUT;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Observable session state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHello,
    Authenticated(SourceId),
    /// Disconnected, or never admitted by this gate
    Closed,
}

enum Session {
    AwaitingHello { timer: AbortHandle },
    Authenticated { peer: SourceId },
}

type Sessions = Arc<Mutex<HashMap<ConnectionId, Session>>>;

fn lock(sessions: &Mutex<HashMap<ConnectionId, Session>>) -> MutexGuard<'_, HashMap<ConnectionId, Session>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Verdict {
    Accept(SourceId),
    Dispatch(SourceId),
    Reject { was_pending: bool },
}

pub struct SessionGate {
    sessions: Sessions,
    dispatcher: Arc<dyn PacketDispatcher>,
    hello_timeout: Duration,
    metrics: Arc<Metrics>,
    server_identity: Option<SourceId>,
}

impl SessionGate {
    pub fn new(dispatcher: Arc<dyn PacketDispatcher>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            dispatcher,
            hello_timeout: HELLO_TIMEOUT,
            metrics: Arc::new(Metrics::new()),
            server_identity: None,
        }
    }

    pub fn with_hello_timeout(mut self, hello_timeout: Duration) -> Self {
        self.hello_timeout = hello_timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Answer every accepted hello with a hello from `identity`.
    pub fn with_server_identity(mut self, identity: SourceId) -> Self {
        self.server_identity = Some(identity);
        self
    }

    pub fn state(&self, connection: ConnectionId) -> SessionState {
        match lock(&self.sessions).get(&connection) {
            Some(Session::AwaitingHello { .. }) => SessionState::AwaitingHello,
            Some(Session::Authenticated { peer }) => SessionState::Authenticated(*peer),
            None => SessionState::Closed,
        }
    }

    /// Proven identity of an authenticated connection.
    pub fn peer(&self, connection: ConnectionId) -> Option<SourceId> {
        match self.state(connection) {
            SessionState::Authenticated(peer) => Some(peer),
            _ => None,
        }
    }

    pub fn authenticated_count(&self) -> usize {
        lock(&self.sessions)
            .values()
            .filter(|session| matches!(session, Session::Authenticated { .. }))
            .count()
    }

    fn arm_timer(&self, connection: &Connection) -> AbortHandle {
        let sessions = Arc::clone(&self.sessions);
        let metrics = Arc::clone(&self.metrics);
        let pending = connection.clone();
        let hello_timeout = self.hello_timeout;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(hello_timeout).await;

            let expired = {
                let mut sessions = lock(&sessions);
                match sessions.get(&pending.id()) {
                    Some(Session::AwaitingHello { .. }) => {
                        sessions.remove(&pending.id());
                        true
                    }
                    _ => false,
                }
            };

            if expired {
                metrics.hello_timeout();
                warn!(
                    connection = %pending.id(),
                    timeout_ms = hello_timeout.as_millis() as u64,
                    "No hello received in time, disconnecting"
                );
                pending.disconnect();
            }
        });

        timer.abort_handle()
    }

    fn judge(&self, connection: &Connection, packet: &Packet) -> Verdict {
        let mut sessions = lock(&self.sessions);
        let id = connection.id();

        let proven = match sessions.get(&id) {
            Some(Session::Authenticated { peer }) => Some(*peer),
            Some(Session::AwaitingHello { .. }) => None,
            None => return Verdict::Reject { was_pending: false },
        };

        if let Some(peer) = proven {
            return Verdict::Dispatch(peer);
        }

        let (verdict, previous) = match (packet.is_hello(), packet.source()) {
            (true, Some(peer)) => (
                Verdict::Accept(peer),
                sessions.insert(id, Session::Authenticated { peer }),
            ),
            _ => (Verdict::Reject { was_pending: true }, sessions.remove(&id)),
        };
        if let Some(Session::AwaitingHello { timer }) = previous {
            timer.abort();
        }
        verdict
    }
}

impl ConnectionObserver for SessionGate {
    fn on_connect(&self, connection: &Connection) {
        let mut sessions = lock(&self.sessions);
        let timer = self.arm_timer(connection);
        sessions.insert(connection.id(), Session::AwaitingHello { timer });
        info!(connection = %connection.id(), peer = ?connection.peer_addr(), "Waiting for hello");
    }

    fn on_disconnect(&self, connection: &Connection) {
        let removed = lock(&self.sessions).remove(&connection.id());
        match removed {
            Some(Session::AwaitingHello { timer }) => {
                timer.abort();
                debug!(connection = %connection.id(), "Unauthenticated session closed");
            }
            Some(Session::Authenticated { peer }) => {
                info!(connection = %connection.id(), %peer, "Session closed");
            }
            None => {}
        }
    }

    fn on_receive(&self, connection: &Connection, packet: &Packet) {
        match self.judge(connection, packet) {
            Verdict::Dispatch(peer) => {
                self.dispatcher.dispatch(
                    DispatchContext {
                        connection: connection.clone(),
                        peer,
                    },
                    packet.clone(),
                );
            }
            Verdict::Accept(peer) => {
                self.metrics.handshake_success();
                info!(connection = %connection.id(), %peer, "Hello accepted");

                if let Some(identity) = self.server_identity {
                    if let Err(e) = connection.send(hello_packet(identity)) {
                        debug!(connection = %connection.id(), error = %e, "Hello reply not queued");
                    }
                }
            }
            Verdict::Reject { was_pending } => {
                if was_pending {
                    self.metrics.handshake_failed();
                }
                warn!(
                    connection = %connection.id(),
                    alias = %packet.alias(),
                    "Connection did not open with hello, disconnecting"
                );
                connection.disconnect();
            }
        }
    }
}
