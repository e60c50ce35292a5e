//! Blink pattern engine for the single-colour status LED.
//!
//! The poll loop calls `tick()` with the elapsed time and writes the
//! returned level to the pin.
//!
//! ## Layers (highest first)
//!
//! 1. **Overlay**: one-shot signal (identify, reset). Plays a single pass,
//!    then falls back to the base pattern from its start.
//! 2. **Base**: the operating-mode pattern, looped forever.
//!
//! A pattern whose steps sum to zero renders as off.

use crate::app::mode::BlinkPattern;

pub struct PatternEngine {
    phase_ms: u32,
    base: Option<BlinkPattern>,
    overlay: Option<BlinkPattern>,
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternEngine {
    pub fn new() -> Self {
        Self {
            phase_ms: 0,
            base: None,
            overlay: None,
        }
    }

    /// Replace the looped pattern. Re-setting the current one keeps its phase.
    pub fn set_base(&mut self, pattern: BlinkPattern) {
        if self.base == Some(pattern) {
            return;
        }
        self.base = Some(pattern);
        if self.overlay.is_none() {
            self.phase_ms = 0;
        }
    }

    /// Play `pattern` once on top of the base. Restarts a running overlay.
    pub fn signal(&mut self, pattern: BlinkPattern) {
        self.overlay = Some(pattern);
        self.phase_ms = 0;
    }

    pub fn base(&self) -> Option<BlinkPattern> {
        self.base
    }

    pub fn overlay(&self) -> Option<BlinkPattern> {
        self.overlay
    }

    /// Advance by `delta_ms` and return whether the LED is lit.
    pub fn tick(&mut self, delta_ms: u32) -> bool {
        self.phase_ms = self.phase_ms.saturating_add(delta_ms);

        if let Some(overlay) = self.overlay {
            let period = overlay.period_ms();
            if self.phase_ms < period {
                return Self::lit_at(overlay, self.phase_ms);
            }
            self.overlay = None;
            self.phase_ms -= period;
        }

        match self.base {
            Some(base) => {
                let period = base.period_ms();
                if period == 0 {
                    return false;
                }
                self.phase_ms %= period;
                Self::lit_at(base, self.phase_ms)
            }
            None => false,
        }
    }

    fn lit_at(pattern: BlinkPattern, phase_ms: u32) -> bool {
        let mut elapsed = 0u32;
        for &step in pattern.steps() {
            elapsed += step.unsigned_abs();
            if phase_ms < elapsed {
                return step > 0;
            }
        }
        false
    }
}
