//! Static accessory declaration handed to the accessory server.
//!
//! One outlet accessory with two services: accessory information (name,
//! manufacturer, model, serial, firmware revision, identify) and the primary
//! outlet service (`On`, `OutletInUse`).

use core::fmt::Write;

use crate::error::{Error, Result};

/// Human-readable accessory name, derived once at boot from the MAC.
pub type AccessoryName = heapless::String<48>;

pub const MANUFACTURER: &str = "iTEAD";
pub const MODEL: &str = "S26";
pub const SERIAL_NUMBER: &str = "037A2BABF19E";
pub const FIRMWARE_REVISION: &str = env!("CARGO_PKG_VERSION");

/// HomeKit accessory category code for outlets.
pub const CATEGORY_OUTLET: u8 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInfo {
    pub name: AccessoryName,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub serial_number: &'static str,
    pub firmware_revision: &'static str,
    pub category: u8,
    /// Outlets report load presence; this board has no sense circuit, so the
    /// value is fixed.
    pub outlet_in_use: bool,
}

impl AccessoryInfo {
    pub fn outlet(name: AccessoryName) -> Self {
        Self {
            name,
            manufacturer: MANUFACTURER,
            model: MODEL,
            serial_number: SERIAL_NUMBER,
            firmware_revision: FIRMWARE_REVISION,
            category: CATEGORY_OUTLET,
            outlet_in_use: true,
        }
    }
}

/// Derive the accessory name: `prefix` plus the last three MAC octets in
/// uppercase hex, e.g. `Sonoff Outlet-A1B2C3`.
///
/// Fails with [`Error::Identity`] when the result does not fit
/// [`AccessoryName`]; the accessory is never advertised unnamed.
pub fn accessory_name(prefix: &str, mac: &[u8; 6]) -> Result<AccessoryName> {
    let mut name = AccessoryName::new();
    write!(name, "{}-{:02X}{:02X}{:02X}", prefix, mac[3], mac[4], mac[5])
        .map_err(|_| Error::Identity)?;
    Ok(name)
}
