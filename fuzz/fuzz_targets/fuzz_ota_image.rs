//! Fuzz target: `receive_image`
//!
//! Feeds arbitrary streams (length prefix included) into one OTA session.
//! A transfer either completes with exactly the declared size or fails
//! with the session back to idle.
//!
//! cargo fuzz run fuzz_ota_image

#![no_main]

use libfuzzer_sys::fuzz_target;
use outlet::adapters::ota::{receive_image, OtaSession, SessionState};

fuzz_target!(|data: &[u8]| {
    let mut session = OtaSession::new();
    let mut stream = data;
    match receive_image(&mut stream, &mut session) {
        Ok(size) => {
            assert!(data.len() >= 4 + size as usize, "accepted more than was sent");
            assert_eq!(session.state(), SessionState::ReadyToReboot);
        }
        Err(_) => assert_eq!(
            session.state(),
            SessionState::Idle,
            "failed transfer left the session open"
        ),
    }
});
