//! # Game Transport
//!
//! Duplex, length-framed, optionally token-authenticated packet transport for
//! multiplayer game servers.
//!
//! ## Overview
//! - [`core`]: packet aliases, packets and the envelope codec
//! - [`protocol`]: packet registry, dispatch and the hello session gate
//! - [`transport`]: connections, observers and the TCP server
//! - [`utils`]: token cipher, tokens, metrics, logging and timeouts
//!
//! ## Flow
//! ```text
//! Server accepts ─► Connection (send loop + receive loop)
//!                     │
//!                     ├─► SessionGate: hello? ─► Authenticated ─► PacketDispatcher
//!                     │                 other ─► disconnect
//!                     └─► timeout without hello ─► disconnect
//! ```
//!
//! ## Example
//! ```no_run
//! use game_transport::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<()> {
//! let config = NetworkConfig::default();
//! let registry = Arc::new(PacketRegistry::with_hello()?);
//! registry.register_name("chat", |source, payload| {
//!     let packet = Packet::new(Alias::from_name("chat"), payload);
//!     Ok(match source {
//!         Some(source) => packet.with_source(source),
//!         None => packet,
//!     })
//! })?;
//!
//! let (dispatcher, mut inbound) = ChannelDispatcher::channel();
//! let gate = Arc::new(
//!     SessionGate::new(Arc::new(dispatcher)).with_hello_timeout(config.server.hello_timeout),
//! );
//! let server = Server::from_config(&config, registry)
//!     .session_gate(gate)
//!     .bind()
//!     .await?;
//!
//! tokio::spawn(async move {
//!     while let Some(dispatched) = inbound.recv().await {
//!         println!("{} sent {}", dispatched.context.peer, dispatched.packet.alias());
//!     }
//! });
//! server.run().await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::alias::{Alias, ConnectionId, SourceId};
pub use crate::core::codec::{Envelope, EnvelopeCodec};
pub use crate::core::packet::{hello_alias, hello_packet, Packet, PacketBody};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::registry::PacketRegistry;
pub use crate::protocol::session::{SessionGate, SessionState};
pub use crate::transport::connection::{Authentication, Connection, ConnectionContext};
pub use crate::transport::server::Server;

/// Commonly used types for building clients and servers.
pub mod prelude {
    pub use crate::config::{AuthenticationMode, NetworkConfig};
    pub use crate::core::alias::{Alias, ConnectionId, SourceId};
    pub use crate::core::packet::{hello_alias, hello_packet, Packet, PacketBody};
    pub use crate::error::{ProtocolError, Result};
    pub use crate::protocol::dispatcher::{
        ChannelDispatcher, DispatchContext, Dispatched, HandlerTable, PacketDispatcher,
    };
    pub use crate::protocol::registry::PacketRegistry;
    pub use crate::protocol::session::{SessionGate, SessionState};
    pub use crate::transport::connection::{Authentication, Connection, ConnectionContext};
    pub use crate::transport::observer::{ConnectionObserver, Subscribers};
    pub use crate::transport::server::Server;
}
