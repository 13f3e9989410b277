//! # Transport Layer
//!
//! TCP connections with a send loop and a receive loop each, the listener that
//! accepts them, and the observer interface connecting both to the rest of the
//! process.

pub mod connection;
pub mod observer;
pub mod server;
