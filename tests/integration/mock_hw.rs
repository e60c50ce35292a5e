//! Mock adapters for integration tests.
//!
//! Every port call lands in one shared [`Journal`] in call order, so tests
//! can assert on the full command history (relay writes, LED patterns,
//! server calls, emitted events, reset delays) without real hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use outlet::app::accessory::AccessoryInfo;
use outlet::app::controller::{Boot, Collaborators, ModeController};
use outlet::app::events::AppEvent;
use outlet::app::mode::BlinkPattern;
use outlet::app::ports::{
    AccessoryListener, AccessoryServerPort, ButtonConfig, ButtonError, ButtonListener, ButtonPort,
    ConnectivityError, ConnectivityListener, EventSink, OtaError, OtaPort, RelayPort, ServerError,
    Ssid, StatusLedPort, StorageError, StoragePort, SystemPort, WifiConfigPort,
};
use outlet::config::OutletConfig;

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Relay(bool),
    SetPattern(BlinkPattern),
    Signal(BlinkPattern),
    ServerStart { name: String, setup_code: String },
    NotifyPower(bool),
    ServerReset,
    WifiStart { ap_ssid: String },
    WifiReset,
    OtaStart(u16),
    Restart,
    StorageWrite { key: String, data: Vec<u8> },
    Delay(u32),
    Event(AppEvent),
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

#[allow(dead_code)]
impl Journal {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn events(&self) -> Vec<AppEvent> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Event(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Every non-event call, in order.
    pub fn commands(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Event(_)))
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn last_relay(&self) -> Option<bool> {
        self.calls().iter().rev().find_map(|c| match c {
            Call::Relay(on) => Some(*on),
            _ => None,
        })
    }

    pub fn last_pattern(&self) -> Option<BlinkPattern> {
        self.calls().iter().rev().find_map(|c| match c {
            Call::SetPattern(p) => Some(*p),
            _ => None,
        })
    }
}

// ── Knobs shared between a rig and its mocks ──────────────────

#[derive(Clone, Default)]
pub struct Flag(Arc<AtomicBool>);

#[allow(dead_code)]
impl Flag {
    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Mocks ─────────────────────────────────────────────────────

pub struct MockRelay(Journal);

impl RelayPort for MockRelay {
    fn write(&mut self, on: bool) {
        self.0.push(Call::Relay(on));
    }
}

pub struct MockLed(Journal);

impl StatusLedPort for MockLed {
    fn set_pattern(&mut self, pattern: BlinkPattern) {
        self.0.push(Call::SetPattern(pattern));
    }

    fn signal_pattern(&mut self, pattern: BlinkPattern) {
        self.0.push(Call::Signal(pattern));
    }
}

pub struct MockServer {
    journal: Journal,
    paired: Flag,
    fail_start: Flag,
    fail_reset: Flag,
    echo: Flag,
    listener: Arc<Mutex<Option<Arc<dyn AccessoryListener>>>>,
}

impl AccessoryServerPort for MockServer {
    fn start(
        &mut self,
        accessory: &AccessoryInfo,
        setup_code: &str,
        listener: Arc<dyn AccessoryListener>,
    ) -> Result<(), ServerError> {
        self.journal.push(Call::ServerStart {
            name: accessory.name.to_string(),
            setup_code: setup_code.to_string(),
        });
        if self.fail_start.get() {
            return Err(ServerError::InitFailed);
        }
        *self.listener.lock().unwrap() = Some(listener);
        Ok(())
    }

    fn is_paired(&self) -> bool {
        self.paired.get()
    }

    fn notify_power(&mut self, on: bool) {
        self.journal.push(Call::NotifyPower(on));
        if self.echo.get() {
            // esp-homekit runs the `On` write callback inside notify.
            let listener = self.listener.lock().unwrap().clone();
            if let Some(listener) = listener {
                listener.on_power_write(on);
            }
        }
    }

    fn reset(&mut self) -> Result<(), ServerError> {
        self.journal.push(Call::ServerReset);
        if self.fail_reset.get() {
            return Err(ServerError::ResetFailed);
        }
        self.paired.set(false);
        Ok(())
    }
}

pub struct MockWifi {
    journal: Journal,
    ssid: Arc<Mutex<Option<String>>>,
    fail_start: Flag,
    fail_reset: Flag,
}

impl WifiConfigPort for MockWifi {
    fn start(
        &mut self,
        ap_ssid: &str,
        _ap_password: &str,
        _listener: Arc<dyn ConnectivityListener>,
    ) -> Result<(), ConnectivityError> {
        self.journal.push(Call::WifiStart {
            ap_ssid: ap_ssid.to_string(),
        });
        if self.fail_start.get() {
            return Err(ConnectivityError::DriverFailed);
        }
        Ok(())
    }

    fn configured_ssid(&self) -> Option<Ssid> {
        self.ssid
            .lock()
            .unwrap()
            .as_deref()
            .and_then(|s| Ssid::try_from(s).ok())
    }

    fn reset(&mut self) -> Result<(), StorageError> {
        self.journal.push(Call::WifiReset);
        if self.fail_reset.get() {
            return Err(StorageError::IoError);
        }
        *self.ssid.lock().unwrap() = None;
        Ok(())
    }
}

pub struct MockOta {
    journal: Journal,
    fail: Flag,
}

impl OtaPort for MockOta {
    fn start(&mut self, port: u16) -> Result<(), OtaError> {
        self.journal.push(Call::OtaStart(port));
        if self.fail.get() {
            return Err(OtaError::BindFailed);
        }
        Ok(())
    }
}

pub struct MockSystem(Journal);

impl SystemPort for MockSystem {
    fn restart(&mut self) {
        self.0.push(Call::Restart);
    }
}

pub struct MockStorage {
    journal: Journal,
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl StoragePort for MockStorage {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.data.lock().unwrap().get(&format!("{}::{}", ns, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let key = format!("{}::{}", ns, key);
        self.journal.push(Call::StorageWrite {
            key: key.clone(),
            data: data.to_vec(),
        });
        self.data.lock().unwrap().insert(key, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.data.lock().unwrap().remove(&format!("{}::{}", ns, key));
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.data
            .lock()
            .unwrap()
            .contains_key(&format!("{}::{}", ns, key))
    }
}

pub struct JournalSink(Journal);

impl EventSink for JournalSink {
    fn emit(&mut self, event: &AppEvent) {
        self.0.push(Call::Event(event.clone()));
    }
}

#[derive(Default)]
pub struct MockButton {
    pub fail: bool,
    pub listener: Option<Arc<dyn ButtonListener>>,
}

impl ButtonPort for MockButton {
    fn register(
        &mut self,
        _config: &ButtonConfig,
        listener: Arc<dyn ButtonListener>,
    ) -> Result<(), ButtonError> {
        if self.fail {
            return Err(ButtonError::PinUnavailable);
        }
        self.listener = Some(listener);
        Ok(())
    }
}

/// Records requested delays instead of sleeping.
pub struct MockDelay(pub Journal);

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.push(Call::Delay(ns / 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.push(Call::Delay(ms));
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// One set of mocks sharing a journal, plus the knobs tests flip.
#[derive(Clone, Default)]
pub struct Rig {
    pub journal: Journal,
    pub paired: Flag,
    pub server_fails: Flag,
    pub server_reset_fails: Flag,
    /// Server re-enters `on_power_write` from `notify_power`.
    pub server_echoes: Flag,
    pub wifi_fails: Flag,
    pub wifi_reset_fails: Flag,
    pub ota_fails: Flag,
    pub wifi_ssid: Arc<Mutex<Option<String>>>,
    pub storage: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub accessory_listener: Arc<Mutex<Option<Arc<dyn AccessoryListener>>>>,
}

pub const MAC: [u8; 6] = [0x18, 0xFE, 0x34, 0xA1, 0xB2, 0xC3];

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rig whose WiFi credentials are already stored.
    pub fn configured() -> Self {
        let rig = Self::default();
        *rig.wifi_ssid.lock().unwrap() = Some("HomeWiFi".to_string());
        rig
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            relay: Box::new(MockRelay(self.journal.clone())),
            led: Box::new(MockLed(self.journal.clone())),
            server: Box::new(MockServer {
                journal: self.journal.clone(),
                paired: self.paired.clone(),
                fail_start: self.server_fails.clone(),
                fail_reset: self.server_reset_fails.clone(),
                echo: self.server_echoes.clone(),
                listener: self.accessory_listener.clone(),
            }),
            wifi: Box::new(MockWifi {
                journal: self.journal.clone(),
                ssid: self.wifi_ssid.clone(),
                fail_start: self.wifi_fails.clone(),
                fail_reset: self.wifi_reset_fails.clone(),
            }),
            ota: Box::new(MockOta {
                journal: self.journal.clone(),
                fail: self.ota_fails.clone(),
            }),
            system: Box::new(MockSystem(self.journal.clone())),
            storage: Box::new(MockStorage {
                journal: self.journal.clone(),
                data: self.storage.clone(),
            }),
            sink: Box::new(JournalSink(self.journal.clone())),
        }
    }

    pub fn boot_with(
        &self,
        config: &OutletConfig,
        button: &mut MockButton,
    ) -> outlet::error::Result<Boot> {
        let button_config = ButtonConfig::from_config(config, 0, false);
        ModeController::boot(config, &MAC, self.collaborators(), button, &button_config)
    }

    pub fn boot(&self) -> Boot {
        self.boot_with(&OutletConfig::default(), &mut MockButton::default())
            .expect("boot")
    }

    pub fn delay(&self) -> MockDelay {
        MockDelay(self.journal.clone())
    }
}
