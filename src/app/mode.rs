//! Operating modes and the blink signature that renders each one.
//!
//! The status LED is the only place a mode is visible, so every mode owns a
//! distinct pattern that a person can tell apart without a serial console:
//!
//! | Mode             | Signature                           |
//! |------------------|-------------------------------------|
//! | NoWifiConfig     | long blink, long wait               |
//! | ConnectingToWifi | two short blinks every 3 s          |
//! | Unpaired         | short blink, long blink, wait       |
//! | Normal           | one short blink every 3 s           |
//! | Identify         | three pairs of short blinks (once)  |
//! | Resetting        | three short blinks (once)           |

/// A blink pattern: signed durations in milliseconds, positive = lit,
/// negative = dark. Played in order and looped by the LED driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    steps: &'static [i32],
}

impl BlinkPattern {
    pub const fn new(steps: &'static [i32]) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &'static [i32] {
        self.steps
    }

    /// Total length of one pass, in milliseconds.
    pub fn period_ms(&self) -> u32 {
        self.steps.iter().map(|s| s.unsigned_abs()).sum()
    }
}

pub const PATTERN_NORMAL: BlinkPattern = BlinkPattern::new(&[100, -2900]);
pub const PATTERN_CONNECTING_TO_WIFI: BlinkPattern = BlinkPattern::new(&[100, -100, 100, -2700]);
pub const PATTERN_NO_WIFI_CONFIG: BlinkPattern = BlinkPattern::new(&[2000, -2000]);
pub const PATTERN_UNPAIRED: BlinkPattern = BlinkPattern::new(&[100, -100, 800, -1000]);
pub const PATTERN_RESETTING: BlinkPattern =
    BlinkPattern::new(&[100, -100, 100, -100, 100, -4500]);
pub const PATTERN_IDENTIFY: BlinkPattern = BlinkPattern::new(&[
    100, -100, 100, -350, 100, -100, 100, -350, 100, -100, 100, -2500,
]);

/// Device operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperatingMode {
    NoWifiConfig = 0,
    ConnectingToWifi = 1,
    Unpaired = 2,
    Normal = 3,
    Identify = 4,
    Resetting = 5,
}

impl OperatingMode {
    pub fn pattern(self) -> BlinkPattern {
        match self {
            Self::NoWifiConfig => PATTERN_NO_WIFI_CONFIG,
            Self::ConnectingToWifi => PATTERN_CONNECTING_TO_WIFI,
            Self::Unpaired => PATTERN_UNPAIRED,
            Self::Normal => PATTERN_NORMAL,
            Self::Identify => PATTERN_IDENTIFY,
            Self::Resetting => PATTERN_RESETTING,
        }
    }

    /// Overlay modes are signalled once on top of the stored mode and are
    /// never stored themselves.
    pub fn is_overlay(self) -> bool {
        matches!(self, Self::Identify | Self::Resetting)
    }
}
