//! Outlet configuration parameters
//!
//! All tunable parameters for the outlet firmware. Defaults match the
//! factory build; values can be overridden by a config blob stored in NVS.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core outlet configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletConfig {
    // --- Accessory ---
    /// Name prefix; the last three MAC octets are appended at boot.
    pub accessory_name_prefix: String<32>,
    /// HomeKit setup passcode in `DDD-DD-DDD` form.
    pub setup_code: String<10>,

    // --- Provisioning access point ---
    pub ap_ssid: String<32>,
    pub ap_password: String<64>,

    // --- Button ---
    /// Hold duration that counts as a long press (milliseconds)
    pub long_press_ms: u32,
    /// Highest distinguishable repeat count (2 = single/double)
    pub max_repeat_presses: u8,
    /// Maximum gap between presses of one repeat series (milliseconds)
    pub repeat_window_ms: u32,
    /// Contact bounce filter (milliseconds)
    pub debounce_ms: u32,

    // --- Services ---
    /// Port the OTA listener binds once WiFi is up
    pub ota_port: u16,
    /// Restore the last commanded power state after a restart
    pub persist_power: bool,
}

impl Default for OutletConfig {
    fn default() -> Self {
        Self {
            accessory_name_prefix: fixed("Sonoff Outlet"),
            setup_code: fixed("052-58-476"),

            ap_ssid: fixed("sonoff-outlet"),
            ap_password: fixed("k8xYngeW"),

            long_press_ms: 5000,
            max_repeat_presses: 2,
            repeat_window_ms: 300,
            debounce_ms: 50,

            ota_port: 69,
            persist_power: false,
        }
    }
}

impl OutletConfig {
    /// Range- and format-check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_setup_code(&self.setup_code)?;

        let ssid = self.ap_ssid.as_str();
        if ssid.is_empty() || !ssid.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
            return Err(ConfigError::ValidationFailed(
                "ap_ssid must be 1-32 printable ASCII bytes",
            ));
        }
        if !(8..=64).contains(&self.ap_password.len()) {
            return Err(ConfigError::ValidationFailed(
                "ap_password must be 8-64 bytes (WPA2)",
            ));
        }
        if self.accessory_name_prefix.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "accessory_name_prefix must not be empty",
            ));
        }
        if !(1..=3).contains(&self.max_repeat_presses) {
            return Err(ConfigError::ValidationFailed(
                "max_repeat_presses must be 1-3",
            ));
        }
        if self.long_press_ms <= self.repeat_window_ms {
            return Err(ConfigError::ValidationFailed(
                "long_press_ms must exceed repeat_window_ms",
            ));
        }
        if self.debounce_ms >= self.repeat_window_ms {
            return Err(ConfigError::ValidationFailed(
                "debounce_ms must be shorter than repeat_window_ms",
            ));
        }
        if self.ota_port == 0 {
            return Err(ConfigError::ValidationFailed("ota_port must be non-zero"));
        }
        Ok(())
    }
}

/// HomeKit passcodes are eight digits grouped `DDD-DD-DDD`. Codes made of a
/// single repeated digit and the two sequential codes are rejected by iOS.
fn validate_setup_code(code: &str) -> Result<(), ConfigError> {
    let bytes = code.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, &b)| match i {
            3 | 6 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(ConfigError::ValidationFailed(
            "setup_code must have the form DDD-DD-DDD",
        ));
    }

    let mut digits = bytes.iter().filter(|b| b.is_ascii_digit());
    let first = digits.next().copied();
    let all_same = digits.all(|&b| Some(b) == first);
    if all_same || code == "123-45-678" || code == "876-54-321" {
        return Err(ConfigError::ValidationFailed("setup_code is too trivial"));
    }
    Ok(())
}

/// Build a fixed-capacity string from a literal known to fit.
fn fixed<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    // Every literal above is shorter than its field capacity.
    let _ = out.push_str(s);
    out
}
