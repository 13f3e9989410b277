//! # Error Types
//!
//! Error handling for the transport layer.
//!
//! Every codec step, registry lookup and token check returns a [`Result`]; the
//! connection loops inspect those results and take the teardown path. None of
//! these errors is fatal to the process.
//!
//! ## Error Categories
//! - **Connect errors**: establishing or accepting a transport connection failed
//! - **Read/Decode errors**: malformed envelope, negative length, unregistered alias,
//!   decryption failure, expired token
//! - **Send errors**: transport write failure
//! - **Configuration errors**: invalid or unreadable configuration
//!
//! ## Example Usage
//! ```rust
//! use game_transport::error::{ProtocolError, Result};
//! use tracing::error;
//!
//! fn check_length(length: i32) -> Result<usize> {
//!     if length < 0 {
//!         return Err(ProtocolError::NegativeLength(length));
//!     }
//!     Ok(length as usize)
//! }
//!
//! if let Err(e) = check_length(-1) {
//!     error!(error = %e, "Rejected envelope");
//! }
//! ```

use crate::core::alias::Alias;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry lock errors
    pub const ERR_REGISTRY_WRITE_LOCK: &str = "Failed to acquire write lock on packet registry";
    pub const ERR_REGISTRY_READ_LOCK: &str = "Failed to acquire read lock on packet registry";

    /// Handler table lock errors
    pub const ERR_HANDLERS_WRITE_LOCK: &str = "Failed to acquire write lock on handler table";
    pub const ERR_HANDLERS_READ_LOCK: &str = "Failed to acquire read lock on handler table";

    /// Token errors
    pub const ERR_SYSTEM_TIME: &str = "System time error: time went backwards";
    pub const ERR_TOKEN_FORMAT: &str = "Malformed token";
    pub const ERR_TOKEN_FROM_FUTURE: &str = "Token timestamp is too far in the future";
    pub const ERR_TOKEN_TOO_LONG: &str = "Token exceeds the 65535 byte field limit";
    pub const ERR_TOKEN_NOT_UTF8: &str = "Token is not valid UTF-8";
    pub const ERR_MISSING_TOKEN: &str = "Envelope carries no token";

    /// Connection errors
    pub const ERR_CONNECT_TIMEOUT: &str = "Timed out connecting to server";
    pub const ERR_HELLO_IDENTITY: &str = "Hello packet carries no identity";
}

/// Primary error type for all transport operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Connect error: {0}")]
    ConnectError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Negative payload length: {0}")]
    NegativeLength(i32),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired ({age_ms} ms old)")]
    TokenExpired { age_ms: u64 },

    #[error("Decryption failed")]
    DecryptionFailure,

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Packet builder not registered for alias {0}")]
    BuilderNotFound(Alias),

    #[error("Packet construction failed: {0}")]
    BuildFailed(String),

    #[error("No handler bound for alias {0}")]
    HandlerNotBound(Alias),

    #[error("Unexpected packet {0}")]
    UnexpectedPacket(Alias),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
