//! GPIO pin assignments for the Sonoff S20/S26 outlet board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// Digital output driving the mains relay coil.
pub const RELAY_GPIO: i32 = 12;
/// Logic level that closes the relay.
pub const RELAY_ACTIVE_HIGH: bool = true;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// Green status LED on the front panel.
pub const LED_GPIO: i32 = 13;
/// The LED is wired to VCC, so it lights when the pin is pulled LOW.
pub const LED_ACTIVE_HIGH: bool = false;

// ---------------------------------------------------------------------------
// Button
// ---------------------------------------------------------------------------

/// Front-panel push button (also the boot-mode strap).
pub const BUTTON_GPIO: i32 = 0;
/// Active-low momentary switch with pull-up.
pub const BUTTON_ACTIVE_HIGH: bool = false;
