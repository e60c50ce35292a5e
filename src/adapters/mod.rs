//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements           | Connects to                    |
//! |-------------|----------------------|--------------------------------|
//! | `homekit`   | AccessoryServerPort  | esp-homekit via `homekit_bridge` |
//! | `log_sink`  | EventSink            | Serial log output              |
//! | `nvs`       | ConfigPort           | NVS / in-memory store          |
//! |             | StoragePort          |                                |
//! | `ota`       | OtaPort              | TCP listener + `esp-ota`       |
//! | `system`    | SystemPort           | `esp_restart`                  |
//! | `wifi`      | WifiConfigPort       | ESP-IDF WiFi STA/AP + HTTP form |
//!
//! `device_id` and `time` are plain helpers used by `main`.

pub mod device_id;
pub mod homekit;
pub mod log_sink;
pub mod nvs;
pub mod ota;
pub mod system;
pub mod time;
pub mod wifi;
