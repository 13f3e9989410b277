//! Per-envelope authentication tokens.
//!
//! Every envelope sent under token framing carries a freshly minted token: the
//! claimed source identity plus the send time, encrypted with the pre-shared key.
//! The receiver decrypts it and rejects it when it is older than the freshness
//! window, whatever state the session is in. Tokens are never cached.
//!
//! Plaintext form: base64 of the bincode-encoded [`TokenData`].

use crate::core::alias::SourceId;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::crypto::Cipher;
use crate::utils::time::current_timestamp_millis;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Largest accepted clock skew for tokens stamped in the future.
pub const FUTURE_TOLERANCE_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub source: Option<SourceId>,
    /// Unix time in milliseconds
    pub issued_at: u64,
}

impl TokenData {
    /// Token for `source` stamped with the current time.
    pub fn create(source: Option<SourceId>) -> Result<Self> {
        Ok(Self {
            source,
            issued_at: current_timestamp_millis()?,
        })
    }

    /// Text form handed to the cipher.
    pub fn encode(&self) -> Result<String> {
        let bytes = bincode::serialize(self)?;
        Ok(STANDARD.encode(bytes))
    }

    pub fn parse(plaintext: &str) -> Result<Self> {
        let malformed = || ProtocolError::InvalidToken(constants::ERR_TOKEN_FORMAT.into());

        let bytes = STANDARD.decode(plaintext).map_err(|_| malformed())?;
        bincode::deserialize(&bytes).map_err(|_| malformed())
    }

    /// Reject tokens older than `freshness` or stamped too far in the future.
    pub fn check_freshness(&self, now: u64, freshness: Duration) -> Result<()> {
        if self.issued_at > now + FUTURE_TOLERANCE_MS {
            return Err(ProtocolError::InvalidToken(
                constants::ERR_TOKEN_FROM_FUTURE.into(),
            ));
        }

        let age_ms = now.saturating_sub(self.issued_at);
        if u128::from(age_ms) > freshness.as_millis() {
            return Err(ProtocolError::TokenExpired { age_ms });
        }
        Ok(())
    }
}

/// Mints and verifies tokens with a shared cipher and freshness window.
#[derive(Clone)]
pub struct TokenAuthority {
    cipher: Arc<dyn Cipher>,
    freshness: Duration,
}

impl TokenAuthority {
    pub fn new(cipher: Arc<dyn Cipher>, freshness: Duration) -> Self {
        Self { cipher, freshness }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Encrypt a token for `source` stamped now.
    pub fn mint(&self, source: Option<SourceId>) -> Result<String> {
        self.seal(&TokenData::create(source)?)
    }

    /// Encrypt an arbitrary token, e.g. one stamped in the past.
    pub fn seal(&self, data: &TokenData) -> Result<String> {
        self.cipher.encrypt(&data.encode()?)
    }

    /// Decrypt, parse and freshness-check a received token.
    pub fn verify(&self, token: &str) -> Result<TokenData> {
        let plaintext = self.cipher.decrypt(token)?;
        let data = TokenData::parse(&plaintext)?;
        data.check_freshness(current_timestamp_millis()?, self.freshness)?;
        debug!(source = ?data.source, issued_at = data.issued_at, "Token verified");
        Ok(data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::utils::crypto::XChaChaCipher;
    use uuid::Uuid;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(
            Arc::new(XChaChaCipher::from_passphrase("test-key")),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn test_encode_parse() {
        let source = Uuid::new_v4();
        let data = TokenData {
            source: Some(source),
            issued_at: 1_700_000_000_000,
        };
        assert_eq!(TokenData::parse(&data.encode().unwrap()).unwrap(), data);

        let anonymous = TokenData {
            source: None,
            issued_at: 42,
        };
        assert_eq!(TokenData::parse(&anonymous.encode().unwrap()).unwrap(), anonymous);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            TokenData::parse("not base64!"),
            Err(ProtocolError::InvalidToken(_))
        ));
        // Valid base64, but too short for a source tag and a timestamp.
        assert!(matches!(
            TokenData::parse(&STANDARD.encode([0u8, 1, 2])),
            Err(ProtocolError::InvalidToken(_))
        ));
        // Option tag outside 0/1.
        assert!(matches!(
            TokenData::parse(&STANDARD.encode([7u8; 16])),
            Err(ProtocolError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_mint_verify() {
        let authority = authority();
        let source = Uuid::new_v4();
        let token = authority.mint(Some(source)).unwrap();
        assert_eq!(authority.verify(&token).unwrap().source, Some(source));
    }

    #[test]
    fn test_expired_token_rejected() {
        let authority = authority();
        let now = current_timestamp_millis().unwrap();
        let stale = TokenData {
            source: Some(Uuid::new_v4()),
            issued_at: now - 31_000,
        };
        let token = authority.seal(&stale).unwrap();
        assert!(matches!(
            authority.verify(&token),
            Err(ProtocolError::TokenExpired { .. })
        ));
    }

    #[test]
    fn test_future_token_rejected() {
        let data = TokenData {
            source: None,
            issued_at: 10_000 + FUTURE_TOLERANCE_MS + 1,
        };
        assert!(data
            .check_freshness(10_000, Duration::from_secs(30))
            .is_err());

        let skewed = TokenData {
            source: None,
            issued_at: 10_000 + FUTURE_TOLERANCE_MS,
        };
        assert!(skewed
            .check_freshness(10_000, Duration::from_secs(30))
            .is_ok());
    }

    #[test]
    fn test_token_from_other_key_rejected() {
        let token = authority().mint(None).unwrap();
        let other = TokenAuthority::new(
            Arc::new(XChaChaCipher::from_passphrase("other-key")),
            Duration::from_secs(30),
        );
        assert!(matches!(
            other.verify(&token),
            Err(ProtocolError::DecryptionFailure)
        ));
    }
}
