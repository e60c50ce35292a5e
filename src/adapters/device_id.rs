//! Device identity derived from the ESP32 station MAC address.
//!
//! The MAC is factory-burned, so everything derived from it is stable across
//! reboots and factory resets:
//! - the accessory name (`Sonoff Outlet-XXYYZZ`, see
//!   [`crate::app::accessory::accessory_name`])
//! - the network hostname (`sonoff-xxyyzz`)

use core::fmt::Write;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the station-interface MAC address.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: `mac` is a valid 6-byte buffer for the duration of the call.
    let read = esp_idf_svc::sys::esp!(unsafe {
        esp_idf_svc::sys::esp_read_mac(
            mac.as_mut_ptr(),
            esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_WIFI_STA,
        )
    });
    if let Err(e) = read {
        log::warn!("esp_read_mac failed ({}), using eFuse default", e);
        // SAFETY: as above.
        unsafe {
            esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
        }
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// DHCP hostname: `sonoff-xxyyzz` (lowercase).
pub fn hostname(mac: &MacAddress) -> heapless::String<24> {
    let mut name = heapless::String::<24>::new();
    let _ = write!(name, "sonoff-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}
