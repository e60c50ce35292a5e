//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART in production).

use log::{info, warn};

use crate::app::events::{AppEvent, PowerSource, RestartReason};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Booted { name, mode, power } => {
                info!("BOOT  | name='{}' | mode={:?} | power={}", name, mode, on_off(*power));
            }
            AppEvent::ModeChanged { from, to } => {
                info!("MODE  | {:?} -> {:?}", from, to);
            }
            AppEvent::PowerChanged { on, source } => {
                let source = match source {
                    PowerSource::Remote => "remote",
                    PowerSource::Button => "button",
                };
                info!("POWER | {} ({})", on_off(*on), source);
            }
            AppEvent::ServerStarted { paired } => {
                info!("HAP   | server started | paired={}", paired);
            }
            AppEvent::OtaListening(port) => {
                info!("OTA   | listening on port {}", port);
            }
            AppEvent::Identified => {
                info!("HAP   | identify");
            }
            AppEvent::ButtonUnavailable => {
                warn!("BTN   | unavailable, local control disabled");
            }
            AppEvent::ButtonIgnored(kind) => {
                info!("BTN   | ignored press kind {}", kind);
            }
            AppEvent::Suppressed(what) => {
                info!("RESET | suppressed {}", what);
            }
            AppEvent::ResetStarted => {
                info!("RESET | started");
            }
            AppEvent::ResetProgress(step) => {
                info!("RESET | {:?}", step);
            }
            AppEvent::Restart(reason) => {
                let reason = match reason {
                    RestartReason::DoublePress => "double press",
                    RestartReason::FactoryReset => "factory reset",
                };
                info!("SYS   | restart ({})", reason);
            }
        }
    }
}
