//! Application core: pure domain logic, zero I/O.
//!
//! The mode controller decides which operating mode the outlet is in and
//! what each incoming event does to the relay, the status LED and the
//! accessory server. All interaction with hardware and vendored services
//! happens through the **port traits** in [`ports`], keeping this layer
//! fully testable without real peripherals.

pub mod accessory;
pub mod controller;
pub mod events;
pub mod mode;
pub mod ports;
pub mod reset;
