#![no_main]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use game_transport::utils::token::TokenData;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bincode bodies behind valid base64 must be rejected, never panic
    let _ = TokenData::parse(&STANDARD.encode(data));

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = TokenData::parse(text);
    }
});
