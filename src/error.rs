//! Unified error type for the outlet firmware.
//!
//! A single `Error` enum that every port error converts into, so boot code
//! can propagate with `?` and `main` can hand the result to `anyhow`.

use core::fmt;

use crate::app::ports::{
    ButtonError, ConfigError, ConnectivityError, OtaError, ServerError, StorageError,
};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The accessory name could not be built from the MAC address.
    Identity,
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral or service initialisation failed.
    Init(&'static str),
    Storage(StorageError),
    Connectivity(ConnectivityError),
    Server(ServerError),
    Ota(OtaError),
    Button(ButtonError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "identity: accessory name does not fit"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Connectivity(e) => write!(f, "wifi: {e}"),
            Self::Server(e) => write!(f, "accessory server: {e}"),
            Self::Ota(e) => write!(f, "ota: {e}"),
            Self::Button(e) => write!(f, "button: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

impl From<ServerError> for Error {
    fn from(e: ServerError) -> Self {
        Self::Server(e)
    }
}

impl From<OtaError> for Error {
    fn from(e: OtaError) -> Self {
        Self::Ota(e)
    }
}

impl From<ButtonError> for Error {
    fn from(e: ButtonError) -> Self {
        Self::Button(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
