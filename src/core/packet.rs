//! Typed packets.
//!
//! A [`Packet`] is an immutable message: the [`Alias`] naming its type, an
//! optional sender identity and an opaque payload. Packets carry no socket
//! affinity; the same packet can be queued on any connection.
//!
//! Application messages that want a structured payload implement [`PacketBody`]
//! and travel bincode-encoded.

use crate::core::alias::{Alias, SourceId};
use crate::error::{constants, ProtocolError, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Name of the handshake packet type.
pub const HELLO_PACKET_NAME: &str = "hello";

/// Alias of the handshake packet type.
pub fn hello_alias() -> Alias {
    Alias::from_name(HELLO_PACKET_NAME)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    alias: Alias,
    source: Option<SourceId>,
    payload: Bytes,
}

impl Packet {
    pub fn new(alias: Alias, payload: impl Into<Bytes>) -> Self {
        Self {
            alias,
            source: None,
            payload: payload.into(),
        }
    }

    /// Attach the sender identity.
    pub fn with_source(mut self, source: SourceId) -> Self {
        self.source = Some(source);
        self
    }

    pub(crate) fn with_optional_source(mut self, source: Option<SourceId>) -> Self {
        self.source = source;
        self
    }

    pub fn alias(&self) -> Alias {
        self.alias
    }

    pub fn source(&self) -> Option<SourceId> {
        self.source
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn is_hello(&self) -> bool {
        self.alias == hello_alias()
    }

    /// Encode a typed body into a packet of its alias.
    pub fn from_body<T: PacketBody>(body: &T) -> Result<Self> {
        let payload = bincode::serialize(body)?;
        Ok(Self::new(T::alias(), payload))
    }

    /// Decode the payload as `T`. Fails if the alias doesn't belong to `T`.
    pub fn body<T: PacketBody>(&self) -> Result<T> {
        if self.alias != T::alias() {
            return Err(ProtocolError::UnexpectedPacket(self.alias));
        }
        Ok(bincode::deserialize(&self.payload)?)
    }
}

/// A structured packet payload with a name-derived alias.
pub trait PacketBody: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Human-readable packet type name, hashed into the alias.
    const NAME: &'static str;

    fn alias() -> Alias {
        Alias::from_name(Self::NAME)
    }
}

/// Build the handshake packet announcing `identity`.
///
/// The identity is both the packet source (which token framing carries) and the
/// 16-byte payload (which unauthenticated framing relies on).
pub fn hello_packet(identity: SourceId) -> Packet {
    Packet::new(hello_alias(), identity.as_bytes().to_vec()).with_source(identity)
}

/// Registry builder for the handshake packet type.
///
/// A token-proven source wins over whatever the payload claims; without a token
/// the payload must hold exactly one identity.
pub fn build_hello(source: Option<SourceId>, payload: Bytes) -> Result<Packet> {
    let identity = match source {
        Some(source) => source,
        None => Uuid::from_slice(&payload)
            .map_err(|_| ProtocolError::BuildFailed(constants::ERR_HELLO_IDENTITY.into()))?,
    };
    Ok(Packet::new(hello_alias(), payload).with_source(identity))
}
