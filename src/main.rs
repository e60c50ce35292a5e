//! Sonoff Outlet Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Relay   StatusLedHandle   HomekitServer   WifiProvisioner     │
//! │  OtaListener   SystemAdapter   NvsAdapter   LogEventSink       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            ModeController (pure logic)                 │    │
//! │  │  mode · power · initialized · reset                    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Poll loop (button + LED)   ·   Reset worker task              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{PinDriver, Pull};
use esp_idf_svc::hal::peripherals::Peripherals;
use log::{info, warn};

use outlet::adapters::device_id;
use outlet::adapters::homekit::HomekitServer;
use outlet::adapters::log_sink::LogEventSink;
use outlet::adapters::nvs::NvsAdapter;
use outlet::adapters::ota::{self, OtaListener};
use outlet::adapters::system::SystemAdapter;
use outlet::adapters::time::Esp32TimeAdapter;
use outlet::adapters::wifi::WifiProvisioner;
use outlet::app::controller::{Boot, Collaborators, ModeController};
use outlet::app::ports::{ButtonConfig, ConfigError, ConfigPort};
use outlet::config::OutletConfig;
use outlet::drivers::button::ButtonService;
use outlet::drivers::relay::Relay;
use outlet::drivers::status_led::{StatusLed, StatusLedHandle};
use outlet::drivers::task_pin::{self, Core, TaskSpec};
use outlet::error::Error;
use outlet::pins;

/// Button sampling and LED rendering period.
const POLL_INTERVAL_MS: u32 = 10;

const RESET_TASK: TaskSpec = TaskSpec {
    name: "reset\0",
    core: Core::App,
    priority: 5,
    stack_kb: 4,
};

fn load_config(nvs: &NvsAdapter) -> OutletConfig {
    match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(ConfigError::NotFound) => {
            info!("No stored config, using defaults");
            OutletConfig::default()
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            OutletConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Sonoff Outlet v{}", env!("CARGO_PKG_VERSION"));
    ota::mark_running_valid();

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    // ── 2. Storage and config ─────────────────────────────────
    let nvs = NvsAdapter::new().map_err(Error::from)?;
    let config = load_config(&nvs);

    // ── 3. GPIO ───────────────────────────────────────────────
    let relay = Relay::new(
        PinDriver::output(peripherals.pins.gpio12)?,
        pins::RELAY_ACTIVE_HIGH,
    );
    let led = StatusLedHandle::new(StatusLed::new(
        PinDriver::output(peripherals.pins.gpio13)?,
        pins::LED_ACTIVE_HIGH,
    ));
    let mut button_pin = PinDriver::input(peripherals.pins.gpio0)?;
    button_pin.set_pull(Pull::Up)?;
    let mut button = ButtonService::new(button_pin, pins::BUTTON_ACTIVE_HIGH);

    // ── 4. Identity and radio ─────────────────────────────────
    let mac = device_id::read_mac();
    let wifi = WifiProvisioner::new(
        nvs.clone(),
        peripherals.modem,
        sysloop.clone(),
        nvs.partition(),
        &device_id::hostname(&mac),
    )
    .map_err(Error::from)?;

    // ── 5. Boot the controller ────────────────────────────────
    let ports = Collaborators {
        relay: Box::new(relay),
        led: Box::new(led.clone()),
        server: Box::new(HomekitServer::new()),
        wifi: Box::new(wifi),
        ota: Box::new(OtaListener::new()),
        system: Box::new(SystemAdapter::new()),
        storage: Box::new(nvs.clone()),
        sink: Box::new(LogEventSink::new()),
    };
    let button_config =
        ButtonConfig::from_config(&config, pins::BUTTON_GPIO, pins::BUTTON_ACTIVE_HIGH);
    let Boot {
        controller,
        reset_worker,
    } = ModeController::boot(&config, &mac, ports, &mut button, &button_config)?;
    info!("'{}' up in {:?}", controller.name(), controller.mode());

    task_pin::spawn(RESET_TASK, move || {
        reset_worker.run(FreeRtos);
    })?;

    // ── 6. Poll loop ──────────────────────────────────────────
    let time = Esp32TimeAdapter::new();
    let mut last_ms = time.uptime_ms();
    loop {
        let now_ms = time.uptime_ms();
        button.poll(now_ms);
        led.tick(now_ms.wrapping_sub(last_ms));
        last_ms = now_ms;
        FreeRtos::delay_ms(POLL_INTERVAL_MS);
    }
}
