//! HomeKit accessory server adapter.
//!
//! Implements [`AccessoryServerPort`].
//!
//! - **`target_os = "espidf"`**: drives the esp-homekit server through the
//!   `homekit_bridge` C component (bindings generated by `esp-idf-sys`).
//!   Server events arrive on the HomeKit task through an `extern "C"`
//!   trampoline and are dispatched to the registered listener.
//! - **all other targets**: in-memory simulation. Clones share state, so a
//!   test keeps one handle while the controller owns another.

use std::sync::Arc;

use log::{info, warn};

use crate::app::accessory::AccessoryInfo;
use crate::app::ports::{AccessoryListener, AccessoryServerPort, ServerError};

#[cfg(not(target_os = "espidf"))]
use std::sync::{Mutex, PoisonError};

// Event codes shared with `homekit_bridge.h`.
const EVENT_PAIRING_ADDED: u8 = 0;
const EVENT_PAIRING_REMOVED: u8 = 1;
const EVENT_POWER_WRITE: u8 = 2;
const EVENT_IDENTIFY: u8 = 3;

/// Route one bridge event to the listener.
fn dispatch(listener: &dyn AccessoryListener, event: u8, value: bool) {
    match event {
        EVENT_PAIRING_ADDED => listener.on_pairing_added(),
        EVENT_PAIRING_REMOVED => listener.on_pairing_removed(),
        EVENT_POWER_WRITE => listener.on_power_write(value),
        EVENT_IDENTIFY => listener.on_identify(),
        other => warn!("HomeKit: unknown bridge event {}", other),
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
struct SimState {
    listener: Option<Arc<dyn AccessoryListener>>,
    pairings: u8,
    last_notified: Option<bool>,
    resets: u32,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Clone, Default)]
pub struct HomekitServer {
    sim: Arc<Mutex<SimState>>,
}

#[cfg(not(target_os = "espidf"))]
impl HomekitServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_sim<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> T {
        let mut sim = self.sim.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut sim)
    }

    /// Deliver `event` with the state lock released, as the server task would.
    fn deliver(&self, event: u8, value: bool) {
        let listener = self.with_sim(|sim| sim.listener.clone());
        match listener {
            Some(listener) => dispatch(listener.as_ref(), event, value),
            None => warn!("HomeKit(sim): event {} before start", event),
        }
    }

    pub fn simulate_pairing_added(&self) {
        self.with_sim(|sim| sim.pairings = sim.pairings.saturating_add(1));
        self.deliver(EVENT_PAIRING_ADDED, false);
    }

    pub fn simulate_pairing_removed(&self) {
        self.with_sim(|sim| sim.pairings = sim.pairings.saturating_sub(1));
        self.deliver(EVENT_PAIRING_REMOVED, false);
    }

    pub fn simulate_power_write(&self, on: bool) {
        self.deliver(EVENT_POWER_WRITE, on);
    }

    pub fn simulate_identify(&self) {
        self.deliver(EVENT_IDENTIFY, false);
    }

    pub fn last_notified(&self) -> Option<bool> {
        self.with_sim(|sim| sim.last_notified)
    }

    pub fn reset_count(&self) -> u32 {
        self.with_sim(|sim| sim.resets)
    }
}

#[cfg(not(target_os = "espidf"))]
impl AccessoryServerPort for HomekitServer {
    fn start(
        &mut self,
        accessory: &AccessoryInfo,
        _setup_code: &str,
        listener: Arc<dyn AccessoryListener>,
    ) -> Result<(), ServerError> {
        self.with_sim(|sim| {
            if sim.listener.is_some() {
                return Err(ServerError::AlreadyStarted);
            }
            sim.listener = Some(listener);
            Ok(())
        })?;
        info!("HomeKit(sim): serving '{}'", accessory.name);
        Ok(())
    }

    fn is_paired(&self) -> bool {
        self.with_sim(|sim| sim.pairings > 0)
    }

    /// Like esp-homekit without the bridge's guard, the notification runs
    /// the `On` write callback before returning.
    fn notify_power(&mut self, on: bool) {
        let listener = self.with_sim(|sim| {
            sim.last_notified = Some(on);
            sim.listener.clone()
        });
        if let Some(listener) = listener {
            dispatch(listener.as_ref(), EVENT_POWER_WRITE, on);
        }
    }

    fn reset(&mut self) -> Result<(), ServerError> {
        self.with_sim(|sim| {
            sim.pairings = 0;
            sim.resets += 1;
        });
        info!("HomeKit(sim): pairings erased");
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod bridge {
    use core::ffi::c_void;
    use std::ffi::CString;
    use std::sync::Arc;

    use esp_idf_svc::sys::homekit_bridge as ffi;

    use super::dispatch;
    use crate::app::accessory::AccessoryInfo;
    use crate::app::ports::{AccessoryListener, ServerError};

    const HK_OK: i32 = 0;
    const HK_ERR_STARTED: i32 = -1;

    unsafe extern "C" fn on_event(ctx: *mut c_void, event: u8, value: bool) {
        // SAFETY: `ctx` is the leaked box created in `start`; it is never freed.
        let listener = unsafe { &*(ctx as *const Arc<dyn AccessoryListener>) };
        dispatch(listener.as_ref(), event, value);
    }

    fn c_string(s: &str) -> Result<CString, ServerError> {
        CString::new(s).map_err(|_| ServerError::InitFailed)
    }

    pub(super) fn start(
        accessory: &AccessoryInfo,
        setup_code: &str,
        listener: Arc<dyn AccessoryListener>,
    ) -> Result<(), ServerError> {
        let name = c_string(&accessory.name)?;
        let manufacturer = c_string(accessory.manufacturer)?;
        let model = c_string(accessory.model)?;
        let serial = c_string(accessory.serial_number)?;
        let revision = c_string(accessory.firmware_revision)?;
        let code = c_string(setup_code)?;

        let info = ffi::hk_accessory_info_t {
            name: name.as_ptr(),
            manufacturer: manufacturer.as_ptr(),
            model: model.as_ptr(),
            serial_number: serial.as_ptr(),
            firmware_revision: revision.as_ptr(),
            category: accessory.category,
            outlet_in_use: accessory.outlet_in_use,
        };

        // The server runs for the rest of the program; its callback context
        // is leaked on success.
        let ctx = Box::into_raw(Box::new(listener));
        // SAFETY: all pointers are valid for the call; the bridge copies strings.
        let rc = unsafe { ffi::hk_bridge_start(&info, code.as_ptr(), Some(on_event), ctx.cast()) };
        if rc == HK_OK {
            return Ok(());
        }
        // SAFETY: the bridge rejected the start and holds no reference to ctx.
        drop(unsafe { Box::from_raw(ctx) });
        if rc == HK_ERR_STARTED {
            Err(ServerError::AlreadyStarted)
        } else {
            Err(ServerError::InitFailed)
        }
    }

    pub(super) fn is_paired() -> bool {
        // SAFETY: reads server state only.
        unsafe { ffi::hk_bridge_is_paired() }
    }

    pub(super) fn notify_on(on: bool) {
        // SAFETY: the bridge ignores notifications before start.
        unsafe { ffi::hk_bridge_notify_on(on) }
    }

    /// esp-homekit's reset cannot fail; the error arm covers a bridge that
    /// grows one.
    pub(super) fn reset() -> Result<(), ServerError> {
        // SAFETY: plain call into the server; erases the pairing store.
        match unsafe { ffi::hk_bridge_reset() } {
            HK_OK => Ok(()),
            _ => Err(ServerError::ResetFailed),
        }
    }
}

#[cfg(target_os = "espidf")]
#[derive(Default)]
pub struct HomekitServer {
    started: bool,
}

#[cfg(target_os = "espidf")]
impl HomekitServer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(target_os = "espidf")]
impl AccessoryServerPort for HomekitServer {
    fn start(
        &mut self,
        accessory: &AccessoryInfo,
        setup_code: &str,
        listener: Arc<dyn AccessoryListener>,
    ) -> Result<(), ServerError> {
        if self.started {
            return Err(ServerError::AlreadyStarted);
        }
        bridge::start(accessory, setup_code, listener)?;
        self.started = true;
        info!("HomeKit: serving '{}'", accessory.name);
        Ok(())
    }

    fn is_paired(&self) -> bool {
        bridge::is_paired()
    }

    fn notify_power(&mut self, on: bool) {
        bridge::notify_on(on);
    }

    fn reset(&mut self) -> Result<(), ServerError> {
        bridge::reset()
    }
}
