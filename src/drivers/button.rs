//! Debounced push-button driver with repeat counting and long press.
//!
//! ## Hardware
//!
//! Momentary switch to ground with pull-up (GPIO 0 on the Sonoff). The pin
//! is sampled from the poll loop; there is no interrupt.
//!
//! ## Gesture detection
//!
//! | Gesture      | Condition                                        | Event            |
//! |--------------|--------------------------------------------------|------------------|
//! | Single press | one press, no second press within the window     | `SinglePress`    |
//! | Double press | two presses, each within the window              | `DoublePress`    |
//! | Long press   | first press held >= `long_press_ms`              | `LongPress`      |
//! | More presses | n >= 3 (when allowed by `max_repeat_presses`)     | `Unknown(n)`     |
//!
//! Reaching `max_repeat_presses` reports on that release without waiting
//! for the window to close.

use std::sync::Arc;

use embedded_hal::digital::InputPin;
use log::{info, warn};

use crate::app::ports::{ButtonConfig, ButtonError, ButtonEvent, ButtonListener, ButtonPort};

/// Press classifier. Pure: time and level come from the caller.
pub struct ButtonDriver {
    debounce_ms: u32,
    long_press_ms: u32,
    repeat_window_ms: u32,
    max_repeat_presses: u8,

    raw: bool,
    raw_since_ms: u32,
    stable: bool,
    presses: u8,
    press_start_ms: u32,
    last_release_ms: u32,
    long_fired: bool,
}

impl ButtonDriver {
    pub fn new(config: &ButtonConfig) -> Self {
        Self {
            debounce_ms: config.debounce_ms,
            long_press_ms: config.long_press_ms,
            repeat_window_ms: config.repeat_window_ms,
            max_repeat_presses: config.max_repeat_presses.max(1),
            raw: false,
            raw_since_ms: 0,
            stable: false,
            presses: 0,
            press_start_ms: 0,
            last_release_ms: 0,
            long_fired: false,
        }
    }

    /// Debounced level.
    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    /// Feed one sample. `now_ms` is monotonic and may wrap.
    pub fn tick(&mut self, now_ms: u32, pressed: bool) -> Option<ButtonEvent> {
        if pressed != self.raw {
            self.raw = pressed;
            self.raw_since_ms = now_ms;
        }

        if self.raw != self.stable && now_ms.wrapping_sub(self.raw_since_ms) >= self.debounce_ms {
            self.stable = self.raw;
            if self.stable {
                self.presses = self.presses.saturating_add(1);
                self.press_start_ms = now_ms;
            } else {
                self.last_release_ms = now_ms;
                if self.long_fired {
                    self.long_fired = false;
                    self.presses = 0;
                } else if self.presses >= self.max_repeat_presses {
                    return Some(self.finish());
                }
            }
        }

        if self.stable {
            let held = now_ms.wrapping_sub(self.press_start_ms);
            if self.presses == 1 && !self.long_fired && held >= self.long_press_ms {
                self.long_fired = true;
                return Some(ButtonEvent::LongPress);
            }
        } else if self.presses > 0
            && now_ms.wrapping_sub(self.last_release_ms) > self.repeat_window_ms
        {
            return Some(self.finish());
        }

        None
    }

    fn finish(&mut self) -> ButtonEvent {
        let presses = core::mem::take(&mut self.presses);
        match presses {
            1 => ButtonEvent::SinglePress,
            2 => ButtonEvent::DoublePress,
            n => ButtonEvent::Unknown(n),
        }
    }
}

/// Button port adapter: samples `pin` from the poll loop and forwards
/// classified presses to the registered listener.
pub struct ButtonService<P: InputPin> {
    pin: P,
    active_high: bool,
    driver: Option<ButtonDriver>,
    listener: Option<Arc<dyn ButtonListener>>,
}

impl<P: InputPin> ButtonService<P> {
    pub fn new(pin: P, active_high: bool) -> Self {
        Self {
            pin,
            active_high,
            driver: None,
            listener: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.listener.is_some()
    }

    fn sample(&mut self) -> Result<bool, P::Error> {
        self.pin.is_high().map(|high| high == self.active_high)
    }

    /// Sample the pin once and dispatch any completed gesture.
    pub fn poll(&mut self, now_ms: u32) {
        let (Some(_), Some(_)) = (&self.driver, &self.listener) else {
            return;
        };
        let pressed = match self.sample() {
            Ok(pressed) => pressed,
            Err(e) => {
                warn!("Button read failed: {:?}", e);
                return;
            }
        };
        let event = self.driver.as_mut().and_then(|d| d.tick(now_ms, pressed));
        if let (Some(event), Some(listener)) = (event, &self.listener) {
            listener.on_button_event(event);
        }
    }
}

fn check_config(config: &ButtonConfig) -> Result<(), ButtonError> {
    if !(1..=3).contains(&config.max_repeat_presses) {
        return Err(ButtonError::InvalidConfig("max_repeat_presses must be 1-3"));
    }
    if config.long_press_ms <= config.repeat_window_ms {
        return Err(ButtonError::InvalidConfig("long press must outlast the repeat window"));
    }
    if config.debounce_ms >= config.repeat_window_ms {
        return Err(ButtonError::InvalidConfig("debounce must be shorter than the repeat window"));
    }
    Ok(())
}

impl<P: InputPin> ButtonPort for ButtonService<P> {
    fn register(
        &mut self,
        config: &ButtonConfig,
        listener: Arc<dyn ButtonListener>,
    ) -> Result<(), ButtonError> {
        if self.listener.is_some() {
            return Err(ButtonError::AlreadyRegistered);
        }
        check_config(config)?;
        self.active_high = config.active_high;
        if let Err(e) = self.sample() {
            warn!("Button GPIO {} unreadable: {:?}", config.gpio, e);
            return Err(ButtonError::PinUnavailable);
        }
        self.driver = Some(ButtonDriver::new(config));
        self.listener = Some(listener);
        info!(
            "Button on GPIO {} (long press {} ms, up to {} presses)",
            config.gpio, config.long_press_ms, config.max_repeat_presses
        );
        Ok(())
    }
}
