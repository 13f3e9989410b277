//! # Core Protocol Components
//!
//! Packet types, packet identifiers and the envelope codec.
//!
//! ## Components
//! - **Alias**: 128-bit packet type identifiers
//! - **Packet**: Immutable typed messages
//! - **Codec**: Tokio codec for envelope framing over byte streams
//!
//! ## Security
//! - Maximum payload size: 16MB by default (prevents memory exhaustion)
//! - Length validation before allocation
//! - Negative lengths rejected

pub mod alias;
pub mod codec;
pub mod packet;
