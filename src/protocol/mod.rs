//! # Protocol Layer
//!
//! Packet reconstruction, application dispatch and the authentication gate.
//!
//! ## Components
//! - **Registry**: Alias → builder table used by every receive loop
//! - **Dispatcher**: Application entry point for authenticated packets
//! - **Session**: Hello handshake and timeout policy for accepted connections

pub mod dispatcher;
pub mod registry;
pub mod session;
