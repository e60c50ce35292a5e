//! Fuzz target: `parse_credentials_form`
//!
//! The configuration page accepts a POST body from anyone who joins the
//! access point. Whatever arrives, parsing must not panic and anything it
//! accepts must pass credential validation.
//!
//! cargo fuzz run fuzz_credentials_form

#![no_main]

use libfuzzer_sys::fuzz_target;
use outlet::adapters::wifi::parse_credentials_form;

fuzz_target!(|data: &[u8]| {
    if let Ok((ssid, password)) = parse_credentials_form(data) {
        assert!(!ssid.is_empty() && ssid.len() <= 32, "accepted SSID out of range");
        assert!(
            password.is_empty() || (8..=64).contains(&password.len()),
            "accepted password out of range"
        );
    }
});
