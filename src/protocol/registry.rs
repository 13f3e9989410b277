use crate::core::alias::{Alias, SourceId};
use crate::core::packet::{build_hello, hello_alias, Packet, PacketBody};
use crate::error::{constants, ProtocolError, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

type BuilderFn = dyn Fn(Option<SourceId>, Bytes) -> Result<Packet> + Send + Sync + 'static;

/// Alias-keyed packet reconstruction table.
///
/// Builders are registered during startup and looked up concurrently by every
/// receive loop afterwards. Registering an alias twice replaces the first builder.
/// One registry is built by the composition root and shared through `Arc`.
pub struct PacketRegistry {
    builders: RwLock<HashMap<Alias, Arc<BuilderFn>>>,
}

impl Default for PacketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketRegistry {
    pub fn new() -> Self {
        Self {
            builders: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the hello packet type already installed.
    pub fn with_hello() -> Result<Self> {
        let registry = Self::new();
        registry.register(hello_alias(), build_hello)?;
        Ok(registry)
    }

    pub fn register<F>(&self, alias: Alias, builder: F) -> Result<()>
    where
        F: Fn(Option<SourceId>, Bytes) -> Result<Packet> + Send + Sync + 'static,
    {
        let mut builders = self
            .builders
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_WRITE_LOCK.into()))?;

        if builders.insert(alias, Arc::new(builder)).is_some() {
            debug!(%alias, "Packet builder replaced");
        }
        Ok(())
    }

    /// Register a builder under the alias derived from `name`.
    pub fn register_name<F>(&self, name: &str, builder: F) -> Result<()>
    where
        F: Fn(Option<SourceId>, Bytes) -> Result<Packet> + Send + Sync + 'static,
    {
        self.register(Alias::from_name(name), builder)
    }

    /// Register a pass-through builder: the payload is kept as-is.
    pub fn register_raw(&self, alias: Alias) -> Result<()> {
        self.register(alias, move |source, payload| {
            Ok(Packet::new(alias, payload).with_optional_source(source))
        })
    }

    /// Register a typed body; payloads that don't deserialize as `T` fail the decode.
    pub fn register_body<T: PacketBody>(&self) -> Result<()> {
        self.register(T::alias(), |source, payload| {
            let packet = Packet::new(T::alias(), payload).with_optional_source(source);
            packet
                .body::<T>()
                .map_err(|e| ProtocolError::BuildFailed(format!("{}: {e}", T::NAME)))?;
            Ok(packet)
        })
    }

    pub fn contains(&self, alias: Alias) -> bool {
        self.builders
            .read()
            .map(|builders| builders.contains_key(&alias))
            .unwrap_or(false)
    }

    /// Rebuild the typed packet for `alias` from its wire payload.
    pub fn resolve(&self, alias: Alias, source: Option<SourceId>, payload: Bytes) -> Result<Packet> {
        // Clone the builder out so user code never runs under the lock.
        let builder = {
            let builders = self
                .builders
                .read()
                .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_READ_LOCK.into()))?;
            builders
                .get(&alias)
                .cloned()
                .ok_or(ProtocolError::BuilderNotFound(alias))?
        };

        builder(source, payload)
    }
}
