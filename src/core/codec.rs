//! Envelope framing over byte streams.
//!
//! ## Wire Format
//! ```text
//! token framing:  [TokenLen(2)] [Token(TokenLen)] [AliasHigh(8)] [AliasLow(8)] [Length(4)] [Payload(Length)]
//! plain framing:                                  [AliasHigh(8)] [AliasLow(8)] [Length(4)] [Payload(Length)]
//! ```
//! All fixed-width fields are big-endian. `Length` is a signed 32-bit value and a
//! negative length fails the decode. There is no padding and no checksum; the
//! stream transport provides integrity and the token provides authenticity.
//!
//! The codec is stateless apart from its configuration: partial reads leave the
//! buffer untouched until a whole envelope is available.

use crate::config::{AuthenticationMode, MAX_PAYLOAD_SIZE};
use crate::core::alias::Alias;
use crate::error::{constants, ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Size of the token length prefix
pub const TOKEN_LENGTH_SIZE: usize = 2;

/// Alias (16) + payload length (4)
pub const HEADER_SIZE: usize = 20;

/// One framed message as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Encrypted token, present only under token framing
    pub token: Option<String>,
    pub alias: Alias,
    pub payload: Bytes,
}

/// Tokio codec for [`Envelope`] framing.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeCodec {
    mode: AuthenticationMode,
    max_payload_size: usize,
}

impl EnvelopeCodec {
    pub fn new(mode: AuthenticationMode) -> Self {
        Self {
            mode,
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }

    /// Reject payloads larger than `max_payload_size` in both directions.
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size.min(i32::MAX as usize);
        self
    }

    pub fn mode(&self) -> AuthenticationMode {
        self.mode
    }

    fn carries_token(&self) -> bool {
        self.mode == AuthenticationMode::Token
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        let token_len = if self.carries_token() {
            if src.len() < TOKEN_LENGTH_SIZE {
                return Ok(None);
            }
            Some(usize::from(u16::from_be_bytes([src[0], src[1]])))
        } else {
            None
        };

        let offset = token_len.map_or(0, |len| TOKEN_LENGTH_SIZE + len);
        if src.len() < offset + HEADER_SIZE {
            src.reserve(offset + HEADER_SIZE - src.len());
            return Ok(None);
        }

        let mut header = &src[offset..offset + HEADER_SIZE];
        let high = header.get_u64();
        let low = header.get_u64();
        let length = header.get_i32();

        if length < 0 {
            return Err(ProtocolError::NegativeLength(length));
        }
        let payload_len = length as usize;
        if payload_len > self.max_payload_size {
            return Err(ProtocolError::OversizedPacket(payload_len));
        }

        let total = offset + HEADER_SIZE + payload_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        let token = match token_len {
            Some(len) => {
                let raw = frame.split_to(TOKEN_LENGTH_SIZE + len);
                let token = std::str::from_utf8(&raw[TOKEN_LENGTH_SIZE..]).map_err(|_| {
                    ProtocolError::InvalidToken(constants::ERR_TOKEN_NOT_UTF8.into())
                })?;
                Some(token.to_owned())
            }
            None => None,
        };
        frame.advance(HEADER_SIZE);

        Ok(Some(Envelope {
            token,
            alias: Alias::from_parts(high, low),
            payload: frame.freeze(),
        }))
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<()> {
        let payload_len = item.payload.len();
        if payload_len > self.max_payload_size {
            return Err(ProtocolError::OversizedPacket(payload_len));
        }

        if self.carries_token() {
            let token = item
                .token
                .as_deref()
                .ok_or_else(|| ProtocolError::InvalidToken(constants::ERR_MISSING_TOKEN.into()))?;
            let token_len = u16::try_from(token.len())
                .map_err(|_| ProtocolError::InvalidToken(constants::ERR_TOKEN_TOO_LONG.into()))?;

            dst.reserve(TOKEN_LENGTH_SIZE + token.len() + HEADER_SIZE + payload_len);
            dst.put_u16(token_len);
            dst.put_slice(token.as_bytes());
        } else {
            dst.reserve(HEADER_SIZE + payload_len);
        }

        dst.put_u64(item.alias.high());
        dst.put_u64(item.alias.low());
        dst.put_i32(payload_len as i32);
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}
