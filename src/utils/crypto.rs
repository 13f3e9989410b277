//! Symmetric string encryption for tokens.
//!
//! The transport only needs an opaque `encrypt(plaintext) -> ciphertext` and
//! `decrypt(ciphertext) -> plaintext` pair keyed by a pre-shared secret. The
//! [`Cipher`] trait is that seam; [`XChaChaCipher`] is the shipped implementation
//! (XChaCha20-Poly1305, random 24-byte nonce, `base64(nonce || ciphertext)`).

use crate::error::{ProtocolError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

const NONCE_SIZE: usize = 24;

/// Opaque, synchronous string cipher keyed at construction.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

pub struct XChaChaCipher {
    cipher: XChaCha20Poly1305,
}

impl XChaChaCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Derive the 256-bit key as SHA-256 of a configured passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let mut key: [u8; 32] = Sha256::digest(passphrase.as_bytes()).into();
        let cipher = Self::new(&key);
        key.zeroize();
        cipher
    }

    fn generate_nonce() -> Result<[u8; NONCE_SIZE]> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::fill(&mut nonce).map_err(|_| ProtocolError::EncryptionFailure)?;
        Ok(nonce)
    }
}

impl Cipher for XChaChaCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Self::generate_nonce()?;
        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| ProtocolError::EncryptionFailure)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let sealed = STANDARD
            .decode(ciphertext)
            .map_err(|_| ProtocolError::DecryptionFailure)?;
        if sealed.len() < NONCE_SIZE {
            return Err(ProtocolError::DecryptionFailure);
        }

        let (nonce, body) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce), body)
            .map_err(|_| ProtocolError::DecryptionFailure)?;

        String::from_utf8(plaintext).map_err(|e| {
            e.into_bytes().zeroize();
            ProtocolError::DecryptionFailure
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_non_utf8_plaintext_rejected() {
        let cipher = XChaChaCipher::from_passphrase("Bar12345Bar12345");
        let nonce = [3u8; NONCE_SIZE];
        let body = cipher
            .cipher
            .encrypt(XNonce::from_slice(&nonce), &[0xC3u8, 0x28][..])
            .unwrap();

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&body);
        assert!(matches!(
            cipher.decrypt(&STANDARD.encode(sealed)),
            Err(ProtocolError::DecryptionFailure)
        ));
    }

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = XChaChaCipher::from_passphrase("Bar12345Bar12345");
        let sealed = cipher.encrypt("hello world").unwrap();
        assert_ne!(sealed, "hello world");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "hello world");
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let cipher = XChaChaCipher::from_passphrase("key");
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = XChaChaCipher::from_passphrase("one").encrypt("secret").unwrap();
        let result = XChaChaCipher::from_passphrase("two").decrypt(&sealed);
        assert!(matches!(result, Err(ProtocolError::DecryptionFailure)));
    }

    #[test]
    fn test_garbage_fails() {
        let cipher = XChaChaCipher::from_passphrase("key");
        assert!(cipher.decrypt("not base64 !!").is_err());
        assert!(cipher.decrypt("AAAA").is_err());
    }
}
