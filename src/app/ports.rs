//! Port traits: the hexagonal boundary between the mode controller and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ModeController (domain)
//!   Adapter ◀── Listener trait ◀── ModeController
//! ```
//!
//! Driven adapters (relay, LED, accessory server, WiFi provisioning, OTA,
//! storage) implement the port traits. Event sources call back into the
//! controller through the listener traits, one method per event kind.
//!
//! ## Threading
//!
//! Listener methods may be invoked from any task. Adapters must never call a
//! listener synchronously from inside one of their own port methods: the
//! controller holds its state lock while it drives a port.
//!
//! The accessory server is the exception. A HomeKit notification runs the
//! characteristic's write callback on the caller's stack, so
//! [`AccessoryServerPort::notify_power`] may call
//! [`AccessoryListener::on_power_write`] before it returns. The controller
//! never calls a server method under its state lock.

use core::fmt;
use std::sync::Arc;

use super::accessory::AccessoryInfo;
use super::events::AppEvent;
use super::mode::BlinkPattern;
use crate::config::OutletConfig;

/// Network name as stored by the provisioning service.
pub type Ssid = heapless::String<32>;

// ───────────────────────────────────────────────────────────────
// Listener traits (event source → domain)
// ───────────────────────────────────────────────────────────────

/// Events delivered by the WiFi provisioning service.
pub trait ConnectivityListener: Send + Sync {
    /// The station obtained an IP address.
    fn on_wifi_connected(&self);
}

/// Events delivered by the accessory server.
pub trait AccessoryListener: Send + Sync {
    fn on_pairing_added(&self);
    fn on_pairing_removed(&self);
    /// A paired controller wrote the `On` characteristic.
    fn on_power_write(&self, on: bool);
    /// A controller asked the accessory to identify itself.
    fn on_identify(&self);
}

/// Classified presses delivered by the button service.
pub trait ButtonListener: Send + Sync {
    fn on_button_event(&self, event: ButtonEvent);
}

// ───────────────────────────────────────────────────────────────
// Relay port
// ───────────────────────────────────────────────────────────────

/// Mains relay. Writes are assumed to succeed.
pub trait RelayPort {
    fn write(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Status LED port
// ───────────────────────────────────────────────────────────────

/// Blink-pattern driver behind the single status LED.
pub trait StatusLedPort {
    /// Loop `pattern` until replaced. Becomes the pattern a signal reverts to.
    fn set_pattern(&mut self, pattern: BlinkPattern);

    /// Play `pattern` once, then return to the last set pattern.
    fn signal_pattern(&mut self, pattern: BlinkPattern);
}

// ───────────────────────────────────────────────────────────────
// Button port
// ───────────────────────────────────────────────────────────────

/// Press kinds reported by the button service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    SinglePress,
    DoublePress,
    LongPress,
    /// Any repeat count the application has no mapping for.
    Unknown(u8),
}

/// Registration parameters for the button service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonConfig {
    pub gpio: i32,
    pub active_high: bool,
    pub max_repeat_presses: u8,
    pub long_press_ms: u32,
    pub repeat_window_ms: u32,
    pub debounce_ms: u32,
}

impl ButtonConfig {
    pub fn from_config(config: &OutletConfig, gpio: i32, active_high: bool) -> Self {
        Self {
            gpio,
            active_high,
            max_repeat_presses: config.max_repeat_presses,
            long_press_ms: config.long_press_ms,
            repeat_window_ms: config.repeat_window_ms,
            debounce_ms: config.debounce_ms,
        }
    }
}

pub trait ButtonPort {
    /// Attach the button and start delivering classified presses to `listener`.
    fn register(
        &mut self,
        config: &ButtonConfig,
        listener: Arc<dyn ButtonListener>,
    ) -> Result<(), ButtonError>;
}

// ───────────────────────────────────────────────────────────────
// WiFi provisioning port
// ───────────────────────────────────────────────────────────────

pub trait WifiConfigPort {
    /// Start provisioning: join the stored network if there is one, otherwise
    /// serve an access point named `ap_ssid` for credential entry.
    fn start(
        &mut self,
        ap_ssid: &str,
        ap_password: &str,
        listener: Arc<dyn ConnectivityListener>,
    ) -> Result<(), ConnectivityError>;

    /// SSID of the stored network, if credentials exist.
    fn configured_ssid(&self) -> Option<Ssid>;

    /// Erase stored credentials.
    fn reset(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Accessory server port
// ───────────────────────────────────────────────────────────────

pub trait AccessoryServerPort {
    /// Start serving `accessory`, authenticating pairings with `setup_code`.
    fn start(
        &mut self,
        accessory: &AccessoryInfo,
        setup_code: &str,
        listener: Arc<dyn AccessoryListener>,
    ) -> Result<(), ServerError>;

    /// Whether at least one controller pairing is stored.
    fn is_paired(&self) -> bool;

    /// Push a new `On` value to subscribed controllers. Before [`start`]
    /// the value is kept and reported once serving begins. May echo the
    /// value back through `on_power_write`.
    ///
    /// [`start`]: AccessoryServerPort::start
    fn notify_power(&mut self, on: bool);

    /// Erase all stored pairings. The esp-homekit server cannot report a
    /// failed erase, so [`ServerError::ResetFailed`] only comes from
    /// implementations whose pairing store can fail.
    fn reset(&mut self) -> Result<(), ServerError>;
}

// ───────────────────────────────────────────────────────────────
// OTA and system ports
// ───────────────────────────────────────────────────────────────

pub trait OtaPort {
    /// Begin listening for firmware images on `port`.
    fn start(&mut self, port: u16) -> Result<(), OtaError>;
}

pub trait SystemPort {
    /// Restart the device. The hardware implementation does not return.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`OutletConfig`].
///
/// Implementations MUST validate before persisting and reject invalid
/// values with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Returns [`ConfigError::NotFound`] if nothing was ever stored.
    fn load(&self) -> Result<OutletConfig, ConfigError>;

    fn save(&self, config: &OutletConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for credentials, power state and config.
///
/// Keys are namespaced per subsystem. Writes are atomic; ESP-IDF NVS
/// guarantees this per commit.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

/// Errors from [`WifiConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    InvalidSsid,
    InvalidPassword,
    DriverFailed,
    Storage(StorageError),
}

/// Errors from [`AccessoryServerPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerError {
    AlreadyStarted,
    InitFailed,
    ResetFailed,
}

/// Errors from [`OtaPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    AlreadyListening,
    BindFailed,
}

/// Errors from [`ButtonPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonError {
    AlreadyRegistered,
    InvalidConfig(&'static str),
    PinUnavailable,
}

impl From<StorageError> for ConnectivityError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::DriverFailed => write!(f, "WiFi driver failed"),
            Self::Storage(e) => write!(f, "credential storage: {}", e),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyStarted => write!(f, "accessory server already started"),
            Self::InitFailed => write!(f, "accessory server failed to start"),
            Self::ResetFailed => write!(f, "pairing store could not be erased"),
        }
    }
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyListening => write!(f, "OTA listener already running"),
            Self::BindFailed => write!(f, "OTA listener could not bind its port"),
        }
    }
}

impl fmt::Display for ButtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered => write!(f, "button already registered"),
            Self::InvalidConfig(msg) => write!(f, "invalid button config: {}", msg),
            Self::PinUnavailable => write!(f, "button pin unavailable"),
        }
    }
}
