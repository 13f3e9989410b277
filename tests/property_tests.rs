//! Property-based tests using proptest
//!
//! Envelope framing, alias mapping and token invariants across randomly
//! generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{Bytes, BytesMut};
use game_transport::config::AuthenticationMode;
use game_transport::core::alias::Alias;
use game_transport::core::codec::{Envelope, EnvelopeCodec, HEADER_SIZE, TOKEN_LENGTH_SIZE};
use game_transport::core::packet::Packet;
use game_transport::error::ProtocolError;
use game_transport::protocol::registry::PacketRegistry;
use game_transport::transport::connection::{Authentication, ConnectionContext};
use game_transport::utils::crypto::XChaChaCipher;
use game_transport::utils::token::{TokenAuthority, TokenData};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::codec::{Decoder, Encoder};
use uuid::Uuid;

fn envelope_strategy(with_token: bool) -> impl Strategy<Value = Envelope> {
    (
        any::<u64>(),
        any::<u64>(),
        prop::collection::vec(any::<u8>(), 0..4096),
        "[A-Za-z0-9+/=]{0,200}",
    )
        .prop_map(move |(high, low, payload, token)| Envelope {
            token: with_token.then_some(token),
            alias: Alias::from_parts(high, low),
            payload: Bytes::from(payload),
        })
}

// Property: a stream of envelopes decodes back to the same sequence, whatever
// the chunking of the incoming bytes
proptest! {
    #[test]
    fn prop_stream_decodes_in_order(
        envelopes in prop::collection::vec(envelope_strategy(true), 1..8),
        chunk in 1usize..64,
    ) {
        let mut codec = EnvelopeCodec::new(AuthenticationMode::Token);
        let mut wire = BytesMut::new();
        for envelope in &envelopes {
            codec.encode(envelope.clone(), &mut wire).expect("encode");
        }

        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buf.extend_from_slice(piece);
            while let Some(envelope) = codec.decode(&mut buf).expect("decode") {
                decoded.push(envelope);
            }
        }

        prop_assert!(buf.is_empty());
        prop_assert_eq!(decoded, envelopes);
    }
}

// Property: encoded size is exactly the header plus its variable parts
proptest! {
    #[test]
    fn prop_encoded_size_exact(envelope in envelope_strategy(true)) {
        let mut buf = BytesMut::new();
        EnvelopeCodec::new(AuthenticationMode::Token)
            .encode(envelope.clone(), &mut buf)
            .expect("encode");

        let token_len = envelope.token.as_ref().map_or(0, String::len);
        prop_assert_eq!(
            buf.len(),
            TOKEN_LENGTH_SIZE + token_len + HEADER_SIZE + envelope.payload.len()
        );
    }
}

// Property: plain framing never emits a token field
proptest! {
    #[test]
    fn prop_plain_layout(envelope in envelope_strategy(false)) {
        let mut buf = BytesMut::new();
        EnvelopeCodec::new(AuthenticationMode::None)
            .encode(envelope.clone(), &mut buf)
            .expect("encode");

        prop_assert_eq!(buf.len(), HEADER_SIZE + envelope.payload.len());
        prop_assert_eq!(&buf[0..8], &envelope.alias.high().to_be_bytes()[..]);
        prop_assert_eq!(&buf[8..16], &envelope.alias.low().to_be_bytes()[..]);
    }
}

// Property: arbitrary bytes never panic the decoder
proptest! {
    #[test]
    fn prop_decoder_never_panics(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        for mode in [AuthenticationMode::Token, AuthenticationMode::None] {
            let mut codec = EnvelopeCodec::new(mode).with_max_payload_size(4096);
            let mut buf = BytesMut::from(&data[..]);
            while let Ok(Some(_)) = codec.decode(&mut buf) {}
        }
    }
}

// Property: alias halves recombine to the same alias
proptest! {
    #[test]
    fn prop_alias_parts(high in any::<u64>(), low in any::<u64>()) {
        let alias = Alias::from_parts(high, low);
        prop_assert_eq!(alias.high(), high);
        prop_assert_eq!(alias.low(), low);
        prop_assert_eq!(Alias::from_u128(alias.as_u128()), alias);
    }
}

// Property: name-derived aliases are stable and distinct names rarely collide
proptest! {
    #[test]
    fn prop_alias_from_name(a in "[a-z.]{1,32}", b in "[a-z.]{1,32}") {
        prop_assert_eq!(Alias::from_name(&a), Alias::from_name(&a));
        if a != b {
            prop_assert_ne!(Alias::from_name(&a), Alias::from_name(&b));
        }
    }
}

// Property: a packet sealed, framed, decoded and opened keeps its alias and
// payload; its source survives exactly when tokens carry it
proptest! {
    #[test]
    fn prop_packet_roundtrip(
        high in any::<u64>(),
        low in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..2048),
        source in prop::option::of(any::<u128>().prop_map(Uuid::from_u128)),
        tokens in any::<bool>(),
    ) {
        let alias = Alias::from_parts(high, low);
        let registry = PacketRegistry::new();
        registry.register_raw(alias).expect("register");

        let authentication = if tokens {
            Authentication::Token(TokenAuthority::new(
                Arc::new(XChaChaCipher::from_passphrase("property-key")),
                Duration::from_secs(30),
            ))
        } else {
            Authentication::None
        };
        let context = ConnectionContext::new(Arc::new(registry), authentication);

        let mut packet = Packet::new(alias, payload);
        if let Some(source) = source {
            packet = packet.with_source(source);
        }

        let mut codec = context.codec();
        let mut wire = BytesMut::new();
        codec.encode(context.seal(&packet).expect("seal"), &mut wire).expect("encode");
        let envelope = codec.decode(&mut wire).expect("decode").expect("complete frame");
        prop_assert!(wire.is_empty());

        let opened = context.open(envelope).expect("open");
        prop_assert_eq!(opened.alias(), alias);
        prop_assert_eq!(opened.payload(), packet.payload());
        prop_assert_eq!(opened.source(), if tokens { source } else { None });
    }
}

// Property: every registered alias resolves to a packet of that alias
proptest! {
    #[test]
    fn prop_registry_resolves_registered(
        aliases in prop::collection::vec((any::<u64>(), any::<u64>()), 1..32),
        payload in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let registry = PacketRegistry::new();
        for &(high, low) in &aliases {
            registry.register_raw(Alias::from_parts(high, low)).expect("register");
        }

        for &(high, low) in &aliases {
            let alias = Alias::from_parts(high, low);
            match registry.resolve(alias, None, Bytes::from(payload.clone())) {
                Ok(packet) => {
                    prop_assert_eq!(packet.alias(), alias);
                    prop_assert_eq!(packet.payload().as_ref(), &payload[..]);
                }
                Err(ProtocolError::BuilderNotFound(_)) => {
                    prop_assert!(false, "registered alias {} not found", alias);
                }
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }
    }
}

// Property: every unregistered alias fails resolution
proptest! {
    #[test]
    fn prop_registry_rejects_unregistered(high in any::<u64>(), low in any::<u64>()) {
        let registry = PacketRegistry::with_hello().expect("registry");
        let alias = Alias::from_parts(high, low);
        prop_assume!(!registry.contains(alias));
        prop_assert!(registry.resolve(alias, None, Bytes::new()).is_err());
    }
}

// Property: token freshness depends only on the age
proptest! {
    #[test]
    fn prop_token_freshness(age in 0u64..120_000, freshness_ms in 100u64..60_000) {
        let now = 1_700_000_000_000u64;
        let data = TokenData { source: Some(Uuid::new_v4()), issued_at: now - age };
        let fresh = data.check_freshness(now, Duration::from_millis(freshness_ms)).is_ok();
        prop_assert_eq!(fresh, age <= freshness_ms);
    }
}
