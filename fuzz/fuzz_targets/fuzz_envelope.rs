#![no_main]

use bytes::BytesMut;
use game_transport::config::AuthenticationMode;
use game_transport::core::codec::EnvelopeCodec;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Decode arbitrary streams under both framings: no panics, no unbounded waits
    for mode in [AuthenticationMode::Token, AuthenticationMode::None] {
        let mut codec = EnvelopeCodec::new(mode).with_max_payload_size(64 * 1024);
        let mut buf = BytesMut::from(data);
        while let Ok(Some(_)) = codec.decode(&mut buf) {}
    }
});
