//! Mode controller: the hexagonal core.
//!
//! [`ModeController`] is the single authority over the operating mode and
//! the outlet's power state. It owns every driven port, registers itself as
//! the listener of every event source, and guards all of its state (plus the
//! relay write) with one mutex so handlers may arrive from any task.
//!
//! The accessory server sits behind a second lock. Its notifications can
//! call straight back into [`AccessoryListener::on_power_write`], so no
//! server method runs while the state lock is held. When both are needed
//! the server lock is taken first.
//!
//! ```text
//!  WiFi provisioning ──▶ ┌──────────────────────┐ ──▶ Relay
//!  Accessory server  ──▶ │    ModeController    │ ──▶ Status LED
//!  Button service    ──▶ │  mode · power · init │ ──▶ Accessory server / OTA
//!                        └──────────┬───────────┘
//!                                   │ ResetRequest
//!                                   ▼
//!                              ResetWorker
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use super::accessory::{self, AccessoryInfo, AccessoryName};
use super::events::{AppEvent, PowerSource, ResetStep, RestartReason};
use super::mode::{OperatingMode, PATTERN_IDENTIFY, PATTERN_RESETTING};
use super::ports::{
    AccessoryListener, AccessoryServerPort, ButtonConfig, ButtonEvent, ButtonListener, ButtonPort,
    ConnectivityListener, EventSink, OtaPort, RelayPort, StatusLedPort, StoragePort, SystemPort,
    WifiConfigPort,
};
use super::reset::{ResetChannel, ResetRequest, ResetWorker};
use crate::config::OutletConfig;
use crate::error::Result;

const POWER_NAMESPACE: &str = "outlet";
const POWER_KEY: &str = "power";

/// Delay between showing the reset pattern and erasing WiFi credentials.
pub const RESET_SIGNAL_MS: u32 = 500;
/// Settle time after each erase so the flash write completes.
pub const RESET_ERASE_SETTLE_MS: u32 = 1000;

// ───────────────────────────────────────────────────────────────
// Collaborators
// ───────────────────────────────────────────────────────────────

/// Every driven port the controller commands. Moved into the controller at
/// boot; nothing else holds them afterwards.
pub struct Collaborators {
    pub relay: Box<dyn RelayPort + Send>,
    pub led: Box<dyn StatusLedPort + Send>,
    pub server: Box<dyn AccessoryServerPort + Send>,
    pub wifi: Box<dyn WifiConfigPort + Send>,
    pub ota: Box<dyn OtaPort + Send>,
    pub system: Box<dyn SystemPort + Send>,
    /// Backs power-state persistence.
    pub storage: Box<dyn StoragePort + Send>,
    pub sink: Box<dyn EventSink + Send>,
}

/// The collaborators guarded by the state lock.
struct Driven {
    relay: Box<dyn RelayPort + Send>,
    led: Box<dyn StatusLedPort + Send>,
    wifi: Box<dyn WifiConfigPort + Send>,
    ota: Box<dyn OtaPort + Send>,
    system: Box<dyn SystemPort + Send>,
    storage: Box<dyn StoragePort + Send>,
    sink: Box<dyn EventSink + Send>,
}

type ServerBox = Box<dyn AccessoryServerPort + Send>;

struct Inner {
    mode: OperatingMode,
    power: bool,
    initialized: bool,
    resetting: bool,
    ports: Driven,
}

impl Inner {
    fn emit(&mut self, event: AppEvent) {
        self.ports.sink.emit(&event);
    }

    /// Overwrite the stored mode and show its pattern.
    fn set_mode(&mut self, mode: OperatingMode) {
        debug_assert!(!mode.is_overlay(), "{mode:?} is never stored");
        let from = self.mode;
        self.mode = mode;
        self.ports.led.set_pattern(mode.pattern());
        if from != mode {
            self.emit(AppEvent::ModeChanged { from, to: mode });
        }
    }

    /// Write-through: state, relay and (optionally) flash move together.
    fn apply_power(&mut self, on: bool, source: PowerSource, persist: bool) {
        self.power = on;
        self.ports.relay.write(on);
        if persist {
            if let Err(e) = self.ports.storage.write(POWER_NAMESPACE, POWER_KEY, &[u8::from(on)]) {
                warn!("Power state not persisted: {}", e);
            }
        }
        self.emit(AppEvent::PowerChanged { on, source });
    }

    fn suppress(&mut self, what: &'static str) {
        debug!("Reset in progress, ignoring {}", what);
        self.emit(AppEvent::Suppressed(what));
    }
}

// ───────────────────────────────────────────────────────────────
// ModeController
// ───────────────────────────────────────────────────────────────

pub struct ModeController {
    inner: Mutex<Inner>,
    server: Mutex<ServerBox>,
    accessory: AccessoryInfo,
    setup_code: heapless::String<10>,
    ota_port: u16,
    persist_power: bool,
    resets: Arc<ResetChannel>,
    this: Weak<ModeController>,
}

/// Result of a successful boot.
pub struct Boot {
    pub controller: Arc<ModeController>,
    /// Must be run on its own task; see [`ResetWorker::run`].
    pub reset_worker: ResetWorker,
}

impl ModeController {
    /// Run the boot sequence.
    ///
    /// 1. Relay to the restored (or default `off`) power state; a restored
    ///    `on` is also handed to the accessory server so it reports it once
    ///    serving.
    /// 2. Status LED is already bound to its pin by the caller.
    /// 3. Accessory name from the MAC suffix; fatal on failure.
    /// 4. Button registration; a failure only disables local control.
    /// 5. WiFi provisioning start.
    /// 6. Initial mode from credential presence.
    ///
    /// Steps 4–6 run under the state lock, so no handler observes a
    /// half-booted controller.
    pub fn boot(
        config: &OutletConfig,
        mac: &[u8; 6],
        ports: Collaborators,
        button: &mut dyn ButtonPort,
        button_config: &ButtonConfig,
    ) -> Result<Boot> {
        config.validate()?;

        let Collaborators {
            mut relay,
            led,
            mut server,
            wifi,
            ota,
            system,
            storage,
            sink,
        } = ports;

        let power = config.persist_power && load_power(&*storage);
        relay.write(power);
        if power {
            server.notify_power(true);
        }

        let name = accessory::accessory_name(&config.accessory_name_prefix, mac)?;
        info!("Accessory name: {}", name);

        let resets = Arc::new(ResetChannel::new());
        let controller = Arc::new_cyclic(|this| Self {
            inner: Mutex::new(Inner {
                mode: OperatingMode::NoWifiConfig,
                power,
                initialized: false,
                resetting: false,
                ports: Driven {
                    relay,
                    led,
                    wifi,
                    ota,
                    system,
                    storage,
                    sink,
                },
            }),
            server: Mutex::new(server),
            accessory: AccessoryInfo::outlet(name.clone()),
            setup_code: config.setup_code.clone(),
            ota_port: config.ota_port,
            persist_power: config.persist_power,
            resets: resets.clone(),
            this: this.clone(),
        });

        {
            let mut inner = controller.lock();

            let button_listener: Arc<dyn ButtonListener> = controller.clone();
            if let Err(e) = button.register(button_config, button_listener) {
                warn!("Failed to initialize button ({}), local control disabled", e);
                inner.emit(AppEvent::ButtonUnavailable);
            }

            let wifi_listener: Arc<dyn ConnectivityListener> = controller.clone();
            inner
                .ports
                .wifi
                .start(&config.ap_ssid, &config.ap_password, wifi_listener)?;

            let mode = match inner.ports.wifi.configured_ssid() {
                Some(ssid) => {
                    info!("WiFi configured for '{}', connecting", ssid);
                    OperatingMode::ConnectingToWifi
                }
                None => {
                    info!("No WiFi configured, serving AP '{}'", config.ap_ssid);
                    OperatingMode::NoWifiConfig
                }
            };
            inner.set_mode(mode);
            inner.emit(AppEvent::Booted { name, mode, power });
        }

        let reset_worker = ResetWorker::new(controller.clone(), resets);
        Ok(Boot {
            controller,
            reset_worker,
        })
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> OperatingMode {
        self.lock().mode
    }

    pub fn power(&self) -> bool {
        self.lock().power
    }

    /// Whether the accessory server and OTA listener have been started.
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Whether a long press has handed the device to the reset sequence.
    pub fn is_resetting(&self) -> bool {
        self.lock().resetting
    }

    pub fn name(&self) -> &AccessoryName {
        &self.accessory.name
    }

    pub fn accessory(&self) -> &AccessoryInfo {
        &self.accessory
    }

    // ── Reset sequence (worker side) ──────────────────────────

    /// Execute the factory reset. Called only by [`ResetWorker`]; the lock is
    /// released during each delay so the LED keeps animating.
    pub(crate) fn run_reset_sequence(&self, delay: &mut impl DelayNs) {
        info!("Resetting outlet configuration");
        {
            let mut inner = self.lock();
            inner.ports.led.signal_pattern(PATTERN_RESETTING);
            inner.emit(AppEvent::ResetProgress(ResetStep::Signalled));
        }
        delay.delay_ms(RESET_SIGNAL_MS);

        {
            let mut inner = self.lock();
            info!("Resetting WiFi config");
            if let Err(e) = inner.ports.wifi.reset() {
                warn!("WiFi credentials not erased: {}", e);
            }
            inner.emit(AppEvent::ResetProgress(ResetStep::WifiErased));
        }
        delay.delay_ms(RESET_ERASE_SETTLE_MS);

        info!("Resetting HomeKit config");
        if let Err(e) = self.server().reset() {
            warn!("Pairings not erased: {}", e);
        }
        self.lock()
            .emit(AppEvent::ResetProgress(ResetStep::PairingsErased));
        delay.delay_ms(RESET_ERASE_SETTLE_MS);

        let mut inner = self.lock();
        info!("Restarting");
        inner.emit(AppEvent::ResetProgress(ResetStep::Restarting));
        inner.emit(AppEvent::Restart(RestartReason::FactoryReset));
        inner.ports.system.restart();
    }

    // ── Internal ──────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking handler must not wedge the relay; keep using the state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn server(&self) -> MutexGuard<'_, ServerBox> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Relay first, then the server. The server lock is held across both so
    /// concurrent toggles reach the server in relay order.
    fn toggle_power(&self) {
        let mut server = self.server();
        let on = {
            let mut inner = self.lock();
            if inner.resetting {
                inner.suppress("button press");
                return;
            }
            let on = !inner.power;
            info!("Toggling relay {}", if on { "on" } else { "off" });
            inner.apply_power(on, PowerSource::Button, self.persist_power);
            on
        };
        server.notify_power(on);
    }

    fn begin_reset(&self, inner: &mut Inner) {
        if inner.resetting {
            debug!("Reset already queued");
            return;
        }
        info!("Resetting Sonoff configuration");
        inner.resetting = true;
        inner.emit(AppEvent::ResetStarted);
        if self.resets.try_send(ResetRequest).is_err() {
            error!("Reset request channel full");
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Listener implementations
// ───────────────────────────────────────────────────────────────

impl ConnectivityListener for ModeController {
    fn on_wifi_connected(&self) {
        // Held throughout, so a second connection event waits for this one.
        let mut server = self.server();
        {
            let mut inner = self.lock();
            if inner.resetting {
                inner.suppress("wifi connected");
                return;
            }
            if inner.initialized {
                debug!("WiFi reconnected, services already running");
                return;
            }
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };

        let listener: Arc<dyn AccessoryListener> = this;
        if let Err(e) = server.start(&self.accessory, &self.setup_code, listener) {
            error!("Accessory server start failed: {}; retrying on next connection", e);
            return;
        }

        let paired = server.is_paired();
        let mut inner = self.lock();
        match inner.ports.ota.start(self.ota_port) {
            Ok(()) => inner.emit(AppEvent::OtaListening(self.ota_port)),
            Err(e) => warn!("OTA listener not started: {}", e),
        }

        inner.initialized = true;
        info!("Accessory server started (paired={})", paired);
        inner.emit(AppEvent::ServerStarted { paired });
        if inner.resetting {
            // A long press landed while the server was starting.
            return;
        }
        inner.set_mode(if paired {
            OperatingMode::Normal
        } else {
            OperatingMode::Unpaired
        });
    }
}

impl AccessoryListener for ModeController {
    fn on_pairing_added(&self) {
        let mut inner = self.lock();
        if inner.resetting {
            inner.suppress("pairing added");
            return;
        }
        inner.set_mode(OperatingMode::Normal);
    }

    fn on_pairing_removed(&self) {
        let paired = self.server().is_paired();
        let mut inner = self.lock();
        if inner.resetting {
            inner.suppress("pairing removed");
            return;
        }
        if paired {
            debug!("Pairing removed, other controllers remain");
            return;
        }
        inner.set_mode(OperatingMode::Unpaired);
    }

    fn on_power_write(&self, on: bool) {
        let mut inner = self.lock();
        if inner.resetting {
            inner.suppress("power write");
            return;
        }
        inner.apply_power(on, PowerSource::Remote, self.persist_power);
    }

    fn on_identify(&self) {
        let mut inner = self.lock();
        if inner.resetting {
            inner.suppress("identify");
            return;
        }
        info!("Outlet identify");
        inner.ports.led.signal_pattern(PATTERN_IDENTIFY);
        inner.emit(AppEvent::Identified);
    }
}

impl ButtonListener for ModeController {
    fn on_button_event(&self, event: ButtonEvent) {
        match event {
            ButtonEvent::SinglePress => self.toggle_power(),
            ButtonEvent::LongPress => self.begin_reset(&mut self.lock()),
            ButtonEvent::DoublePress => {
                let mut inner = self.lock();
                if inner.resetting {
                    inner.suppress("button press");
                    return;
                }
                info!("Restarting");
                inner.emit(AppEvent::Restart(RestartReason::DoublePress));
                inner.ports.system.restart();
            }
            ButtonEvent::Unknown(kind) => {
                let mut inner = self.lock();
                if inner.resetting {
                    inner.suppress("button press");
                    return;
                }
                info!("Unknown button event: {}", kind);
                inner.emit(AppEvent::ButtonIgnored(kind));
            }
        }
    }
}

fn load_power(storage: &dyn StoragePort) -> bool {
    let mut buf = [0u8; 1];
    match storage.read(POWER_NAMESPACE, POWER_KEY, &mut buf) {
        Ok(1) => buf[0] == 1,
        _ => false,
    }
}
