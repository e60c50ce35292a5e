//! Outbound application events.
//!
//! The [`ModeController`](super::controller::ModeController) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on the
//! other side decide what to do with them, such as logging to serial or
//! counting them in a test.

use super::accessory::AccessoryName;
use super::mode::OperatingMode;

/// Who commanded a power change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSource {
    /// Characteristic write from a paired controller.
    Remote,
    /// Single press on the front-panel button.
    Button,
}

/// Why the controller asked for a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    DoublePress,
    FactoryReset,
}

/// Steps of the factory-reset sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStep {
    Signalled,
    WifiErased,
    PairingsErased,
    Restarting,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Boot finished; carries the identity and initial state.
    Booted {
        name: AccessoryName,
        mode: OperatingMode,
        power: bool,
    },

    /// The stored operating mode changed.
    ModeChanged { from: OperatingMode, to: OperatingMode },

    /// The outlet was switched.
    PowerChanged { on: bool, source: PowerSource },

    /// The accessory server came up after the first WiFi connection.
    ServerStarted { paired: bool },

    /// The OTA listener is accepting images.
    OtaListening(u16),

    /// The identify overlay was played.
    Identified,

    /// Button registration failed; the outlet runs without local control.
    ButtonUnavailable,

    /// A press kind with no mapping was dropped.
    ButtonIgnored(u8),

    /// An event arrived while the reset sequence owned the device.
    Suppressed(&'static str),

    /// A long press queued the reset sequence.
    ResetStarted,

    /// One reset step completed.
    ResetProgress(ResetStep),

    /// Restart requested.
    Restart(RestartReason),
}
