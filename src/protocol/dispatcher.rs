use crate::core::alias::{Alias, SourceId};
use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};
use crate::transport::connection::Connection;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Where an authenticated packet came from.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub connection: Connection,
    /// Identity the peer proved during the handshake
    pub peer: SourceId,
}

/// Application entry point for authenticated inbound packets.
///
/// Called on the connection's receive loop; implementations that do real work
/// should hand it off (see [`ChannelDispatcher`]) rather than stall the loop.
pub trait PacketDispatcher: Send + Sync {
    fn dispatch(&self, context: DispatchContext, packet: Packet);
}

impl<F> PacketDispatcher for F
where
    F: Fn(DispatchContext, Packet) + Send + Sync,
{
    fn dispatch(&self, context: DispatchContext, packet: Packet) {
        self(context, packet)
    }
}

type HandlerFn = dyn Fn(&DispatchContext, &Packet) -> Result<()> + Send + Sync + 'static;

/// Alias-keyed handler routing.
pub struct HandlerTable {
    handlers: Arc<RwLock<HashMap<Alias, Box<HandlerFn>>>>,
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerTable {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn bind<F>(&self, alias: Alias, handler: F) -> Result<()>
    where
        F: Fn(&DispatchContext, &Packet) -> Result<()> + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_HANDLERS_WRITE_LOCK.into()))?;

        handlers.insert(alias, Box::new(handler));
        Ok(())
    }

    /// Run the handler bound to the packet's alias.
    pub fn handle(&self, context: &DispatchContext, packet: &Packet) -> Result<()> {
        let handlers = self
            .handlers
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_HANDLERS_READ_LOCK.into()))?;

        handlers
            .get(&packet.alias())
            .ok_or(ProtocolError::HandlerNotBound(packet.alias()))
            .and_then(|handler| handler(context, packet))
    }
}

impl PacketDispatcher for HandlerTable {
    fn dispatch(&self, context: DispatchContext, packet: Packet) {
        if let Err(e) = self.handle(&context, &packet) {
            warn!(
                connection = %context.connection.id(),
                peer = %context.peer,
                alias = %packet.alias(),
                error = %e,
                "Packet dropped by handler table"
            );
        }
    }
}

/// A packet handed to the application off the receive loop.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub context: DispatchContext,
    pub packet: Packet,
}

/// Forwards every packet onto an unbounded channel.
pub struct ChannelDispatcher {
    sender: mpsc::UnboundedSender<Dispatched>,
}

impl ChannelDispatcher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Dispatched>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl PacketDispatcher for ChannelDispatcher {
    fn dispatch(&self, context: DispatchContext, packet: Packet) {
        if self.sender.send(Dispatched { context, packet }).is_err() {
            debug!("Dispatch receiver dropped; packet discarded");
        }
    }
}
