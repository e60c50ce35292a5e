//! Mains relay driver.
//!
//! Generic over `embedded_hal::digital::OutputPin` so the same code drives
//! an esp-idf-hal `PinDriver` and a test pin.

use embedded_hal::digital::OutputPin;
use log::{debug, error};

use crate::app::ports::RelayPort;

pub struct Relay<P: OutputPin> {
    pin: P,
    active_high: bool,
    on: bool,
}

impl<P: OutputPin> Relay<P> {
    /// Take the pin and drive the relay open.
    pub fn new(pin: P, active_high: bool) -> Self {
        let mut relay = Self {
            pin,
            active_high,
            on: false,
        };
        relay.write(false);
        relay
    }

    /// Last level written.
    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl<P: OutputPin> RelayPort for Relay<P> {
    fn write(&mut self, on: bool) {
        let result = if on == self.active_high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => {
                self.on = on;
                debug!("Relay {}", if on { "closed" } else { "open" });
            }
            Err(e) => error!("Relay write failed: {:?}", e),
        }
    }
}
