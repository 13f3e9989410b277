//! Packet type identifiers.
//!
//! An [`Alias`] is a 128-bit value naming a concrete packet type. It travels on
//! the wire as two big-endian `u64` halves (high, then low). Aliases are usually
//! derived from a human-readable name with [`Alias::from_name`], which is a
//! UUIDv5 over a fixed namespace and therefore stable across processes and builds.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a packet sender (a player, a server, a service).
pub type SourceId = Uuid;

/// Process-unique identifier of a [`Connection`](crate::transport::connection::Connection).
pub type ConnectionId = Uuid;

/// Namespace for name-derived aliases. Changing it changes every alias on the wire.
const ALIAS_NAMESPACE: Uuid = Uuid::from_u128(0x6d6d_6f2d_7472_616e_7370_6f72_742d_616c);

/// 128-bit packet type identifier used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Alias(Uuid);

impl Alias {
    /// Derive an alias from a packet type name.
    ///
    /// This is a namespaced UUIDv5, not the namespace-less MD5 name UUID older
    /// clients derive, so those clients' aliases do not match and they cannot
    /// talk to this crate without re-registering by explicit id.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&ALIAS_NAMESPACE, name.as_bytes()))
    }

    /// Build an alias from its wire halves.
    pub const fn from_parts(high: u64, low: u64) -> Self {
        Self(Uuid::from_u64_pair(high, low))
    }

    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Most significant 64 bits, written first on the wire.
    pub fn high(&self) -> u64 {
        self.0.as_u64_pair().0
    }

    /// Least significant 64 bits, written second on the wire.
    pub fn low(&self) -> u64 {
        self.0.as_u64_pair().1
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Alias {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
