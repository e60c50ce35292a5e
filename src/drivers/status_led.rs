//! Single-colour status LED driver.
//!
//! [`StatusLed`] owns the pin and a [`PatternEngine`]; the poll loop calls
//! [`StatusLed::tick`]. [`StatusLedHandle`] is the cloneable, lock-protected
//! side handed to the controller as its LED port, so pattern changes from
//! any task land on the engine the poll loop renders.
//!
//! ## Dual-target design
//!
//! Generic over `embedded_hal::digital::OutputPin`: an esp-idf-hal
//! `PinDriver` on the device, a recording pin in tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::digital::OutputPin;
use log::warn;

use super::led_patterns::PatternEngine;
use crate::app::mode::BlinkPattern;
use crate::app::ports::StatusLedPort;

pub struct StatusLed<P: OutputPin> {
    pin: P,
    active_high: bool,
    engine: PatternEngine,
    lit: Option<bool>,
}

impl<P: OutputPin> StatusLed<P> {
    /// Bind the LED to `pin`, dark.
    pub fn new(pin: P, active_high: bool) -> Self {
        let mut led = Self {
            pin,
            active_high,
            engine: PatternEngine::new(),
            lit: None,
        };
        led.write(false);
        led
    }

    /// Advance the pattern and drive the pin if the level changed.
    pub fn tick(&mut self, delta_ms: u32) {
        let lit = self.engine.tick(delta_ms);
        if self.lit != Some(lit) {
            self.write(lit);
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit.unwrap_or(false)
    }

    pub fn engine(&self) -> &PatternEngine {
        &self.engine
    }

    fn write(&mut self, lit: bool) {
        let result = if lit == self.active_high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.lit = Some(lit),
            Err(e) => warn!("Status LED write failed: {:?}", e),
        }
    }
}

/// Shared handle: implements the LED port for the controller while the
/// poll loop keeps ticking the same LED.
pub struct StatusLedHandle<P: OutputPin>(Arc<Mutex<StatusLed<P>>>);

impl<P: OutputPin> Clone for StatusLedHandle<P> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<P: OutputPin> StatusLedHandle<P> {
    pub fn new(led: StatusLed<P>) -> Self {
        Self(Arc::new(Mutex::new(led)))
    }

    pub fn lock(&self) -> MutexGuard<'_, StatusLed<P>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tick(&self, delta_ms: u32) {
        self.lock().tick(delta_ms);
    }
}

impl<P: OutputPin> StatusLedPort for StatusLedHandle<P> {
    fn set_pattern(&mut self, pattern: BlinkPattern) {
        self.lock().engine.set_base(pattern);
    }

    fn signal_pattern(&mut self, pattern: BlinkPattern) {
        self.lock().engine.signal(pattern);
    }
}
