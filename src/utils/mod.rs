//! # Utility Modules
//!
//! Supporting utilities for cryptography, tokens, logging, and timing.
//!
//! ## Components
//! - **Crypto**: XChaCha20-Poly1305 string cipher behind the `Cipher` trait
//! - **Token**: Per-envelope identity tokens with a freshness window
//! - **Logging**: Structured logging configuration
//! - **Time**: Timestamp utilities for expiry checks
//! - **Timeout**: Timeout defaults and async timeout wrappers
//! - **Metrics**: Thread-safe observability counters
//!
//! ## Security
//! - Cryptographically secure RNG (getrandom) for nonces
//! - Memory zeroing for derived keys and decrypted plaintext (zeroize crate)

pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod time;
pub mod timeout;
pub mod token;
