//! Mode controller integration tests.
//!
//! Drive the controller through its listener traits exactly as the WiFi,
//! accessory-server and button adapters would, and assert on the command
//! journal recorded by the mocks.

use std::sync::mpsc;
use std::time::Duration;

use outlet::app::events::{AppEvent, PowerSource, RestartReason};
use outlet::app::mode::{
    OperatingMode, PATTERN_CONNECTING_TO_WIFI, PATTERN_IDENTIFY, PATTERN_NORMAL, PATTERN_UNPAIRED,
};
use outlet::app::ports::{AccessoryListener, ButtonEvent, ButtonListener, ConnectivityListener};

use crate::mock_hw::{Call, Rig};

// ── WiFi connection ───────────────────────────────────────────

#[test]
fn first_connection_starts_server_and_ota_then_unpaired() {
    let rig = Rig::configured();
    let boot = rig.boot();
    let ctrl = &boot.controller;
    assert_eq!(ctrl.mode(), OperatingMode::ConnectingToWifi);
    rig.journal.clear();

    ctrl.on_wifi_connected();

    assert!(ctrl.is_initialized());
    assert_eq!(ctrl.mode(), OperatingMode::Unpaired);
    assert_eq!(
        rig.journal.commands(),
        vec![
            Call::ServerStart {
                name: "Sonoff Outlet-A1B2C3".into(),
                setup_code: "052-58-476".into(),
            },
            Call::OtaStart(69),
            Call::SetPattern(PATTERN_UNPAIRED),
        ]
    );
    assert!(rig
        .journal
        .events()
        .contains(&AppEvent::ServerStarted { paired: false }));
}

#[test]
fn first_connection_with_existing_pairing_goes_normal() {
    let rig = Rig::configured();
    rig.paired.set(true);
    let boot = rig.boot();

    boot.controller.on_wifi_connected();

    assert_eq!(boot.controller.mode(), OperatingMode::Normal);
    assert_eq!(rig.journal.last_pattern(), Some(PATTERN_NORMAL));
}

#[test]
fn reconnection_does_not_restart_services() {
    let rig = Rig::configured();
    let boot = rig.boot();
    boot.controller.on_wifi_connected();
    boot.controller.on_pairing_added();
    rig.journal.clear();

    boot.controller.on_wifi_connected();
    boot.controller.on_wifi_connected();

    assert!(rig.journal.calls().is_empty());
    assert_eq!(boot.controller.mode(), OperatingMode::Normal);
}

#[test]
fn server_start_failure_is_retried_on_next_connection() {
    let rig = Rig::configured();
    rig.server_fails.set(true);
    let boot = rig.boot();

    boot.controller.on_wifi_connected();
    assert!(!boot.controller.is_initialized());
    assert_eq!(boot.controller.mode(), OperatingMode::ConnectingToWifi);
    assert_eq!(rig.journal.count(&Call::OtaStart(69)), 0);

    rig.server_fails.set(false);
    boot.controller.on_wifi_connected();
    assert!(boot.controller.is_initialized());
    assert_eq!(boot.controller.mode(), OperatingMode::Unpaired);
    assert_eq!(rig.journal.count(&Call::OtaStart(69)), 1);
}

#[test]
fn ota_failure_does_not_block_initialization() {
    let rig = Rig::configured();
    rig.ota_fails.set(true);
    let boot = rig.boot();

    boot.controller.on_wifi_connected();

    assert!(boot.controller.is_initialized());
    assert_eq!(boot.controller.mode(), OperatingMode::Unpaired);
    assert!(!rig
        .journal
        .events()
        .iter()
        .any(|e| matches!(e, AppEvent::OtaListening(_))));
}

#[test]
fn ota_listens_on_configured_port() {
    let rig = Rig::configured();
    let mut config = outlet::config::OutletConfig::default();
    config.ota_port = 8032;
    let boot = rig
        .boot_with(&config, &mut crate::mock_hw::MockButton::default())
        .unwrap();

    boot.controller.on_wifi_connected();

    assert_eq!(rig.journal.count(&Call::OtaStart(8032)), 1);
    assert!(rig.journal.events().contains(&AppEvent::OtaListening(8032)));
}

// ── Pairing ───────────────────────────────────────────────────

#[test]
fn pairing_added_switches_to_normal() {
    let rig = Rig::configured();
    let boot = rig.boot();
    boot.controller.on_wifi_connected();

    rig.paired.set(true);
    boot.controller.on_pairing_added();

    assert_eq!(boot.controller.mode(), OperatingMode::Normal);
    assert!(rig.journal.events().contains(&AppEvent::ModeChanged {
        from: OperatingMode::Unpaired,
        to: OperatingMode::Normal,
    }));
}

#[test]
fn removing_last_pairing_returns_to_unpaired() {
    let rig = Rig::configured();
    rig.paired.set(true);
    let boot = rig.boot();
    boot.controller.on_wifi_connected();

    rig.paired.set(false);
    boot.controller.on_pairing_removed();

    assert_eq!(boot.controller.mode(), OperatingMode::Unpaired);
    assert_eq!(rig.journal.last_pattern(), Some(PATTERN_UNPAIRED));
}

#[test]
fn removing_one_of_several_pairings_keeps_normal() {
    let rig = Rig::configured();
    rig.paired.set(true);
    let boot = rig.boot();
    boot.controller.on_wifi_connected();
    rig.journal.clear();

    boot.controller.on_pairing_removed();

    assert_eq!(boot.controller.mode(), OperatingMode::Normal);
    assert!(rig.journal.calls().is_empty());
}

#[test]
fn pairing_events_are_delivered_through_the_registered_listener() {
    let rig = Rig::configured();
    let boot = rig.boot();
    boot.controller.on_wifi_connected();

    let listener = rig
        .accessory_listener
        .lock()
        .unwrap()
        .clone()
        .expect("server start hands over a listener");
    listener.on_pairing_added();
    assert_eq!(boot.controller.mode(), OperatingMode::Normal);
}

// ── Power ─────────────────────────────────────────────────────

#[test]
fn remote_write_drives_relay_without_echo() {
    let rig = Rig::configured();
    let boot = rig.boot();
    rig.journal.clear();

    boot.controller.on_power_write(true);

    assert!(boot.controller.power());
    assert_eq!(rig.journal.commands(), vec![Call::Relay(true)]);
    assert_eq!(
        rig.journal.events(),
        vec![AppEvent::PowerChanged {
            on: true,
            source: PowerSource::Remote,
        }]
    );
}

#[test]
fn repeated_remote_write_is_idempotent() {
    let rig = Rig::configured();
    let boot = rig.boot();

    boot.controller.on_power_write(true);
    boot.controller.on_power_write(true);

    assert!(boot.controller.power());
    assert_eq!(rig.journal.last_relay(), Some(true));
}

#[test]
fn single_press_toggles_relay_then_notifies_server() {
    let rig = Rig::configured();
    let boot = rig.boot();
    rig.journal.clear();

    boot.controller.on_button_event(ButtonEvent::SinglePress);
    assert!(boot.controller.power());
    boot.controller.on_button_event(ButtonEvent::SinglePress);
    assert!(!boot.controller.power());

    assert_eq!(
        rig.journal.commands(),
        vec![
            Call::Relay(true),
            Call::NotifyPower(true),
            Call::Relay(false),
            Call::NotifyPower(false),
        ]
    );
}

#[test]
fn single_press_returns_when_server_echoes_the_notification() {
    let rig = Rig::configured();
    rig.server_echoes.set(true);
    let boot = rig.boot();
    boot.controller.on_wifi_connected();
    rig.journal.clear();

    let ctrl = boot.controller.clone();
    let (done, finished) = mpsc::channel();
    std::thread::spawn(move || {
        ctrl.on_button_event(ButtonEvent::SinglePress);
        done.send(()).unwrap();
    });
    finished
        .recv_timeout(Duration::from_secs(3))
        .expect("single press handler never returned");

    assert!(boot.controller.power());
    assert_eq!(
        rig.journal.commands(),
        vec![Call::Relay(true), Call::NotifyPower(true), Call::Relay(true)]
    );
    assert_eq!(
        rig.journal.events(),
        vec![
            AppEvent::PowerChanged {
                on: true,
                source: PowerSource::Button,
            },
            AppEvent::PowerChanged {
                on: true,
                source: PowerSource::Remote,
            },
        ]
    );
}

#[test]
fn single_press_works_before_any_wifi() {
    let rig = Rig::new();
    let boot = rig.boot();
    assert_eq!(boot.controller.mode(), OperatingMode::NoWifiConfig);

    boot.controller.on_button_event(ButtonEvent::SinglePress);

    assert!(boot.controller.power());
    assert_eq!(rig.journal.last_relay(), Some(true));
    assert!(rig.journal.events().contains(&AppEvent::PowerChanged {
        on: true,
        source: PowerSource::Button,
    }));
}

#[test]
fn power_is_not_persisted_by_default() {
    let rig = Rig::configured();
    let boot = rig.boot();

    boot.controller.on_power_write(true);

    assert!(!rig
        .journal
        .calls()
        .iter()
        .any(|c| matches!(c, Call::StorageWrite { .. })));
}

// ── Button ────────────────────────────────────────────────────

#[test]
fn double_press_restarts_without_touching_power() {
    let rig = Rig::configured();
    let boot = rig.boot();
    rig.journal.clear();

    boot.controller.on_button_event(ButtonEvent::DoublePress);

    assert_eq!(rig.journal.commands(), vec![Call::Restart]);
    assert_eq!(
        rig.journal.events(),
        vec![AppEvent::Restart(RestartReason::DoublePress)]
    );
    assert!(!boot.controller.power());
}

#[test]
fn unknown_press_count_is_ignored() {
    let rig = Rig::configured();
    let boot = rig.boot();
    rig.journal.clear();

    boot.controller.on_button_event(ButtonEvent::Unknown(3));

    assert!(rig.journal.commands().is_empty());
    assert_eq!(rig.journal.events(), vec![AppEvent::ButtonIgnored(3)]);
    assert_eq!(boot.controller.mode(), OperatingMode::ConnectingToWifi);
}

// ── Identify ──────────────────────────────────────────────────

#[test]
fn identify_plays_overlay_and_keeps_mode() {
    let rig = Rig::configured();
    let boot = rig.boot();
    rig.journal.clear();

    boot.controller.on_identify();

    assert_eq!(rig.journal.commands(), vec![Call::Signal(PATTERN_IDENTIFY)]);
    assert_eq!(boot.controller.mode(), OperatingMode::ConnectingToWifi);
    assert_eq!(rig.journal.last_pattern(), None);
}

#[test]
fn identify_before_connection_leaves_connecting_pattern_underneath() {
    let rig = Rig::configured();
    let boot = rig.boot();

    boot.controller.on_identify();

    assert_eq!(rig.journal.last_pattern(), Some(PATTERN_CONNECTING_TO_WIFI));
}

// ── Suppression while resetting ───────────────────────────────

#[test]
fn events_after_long_press_are_suppressed() {
    let rig = Rig::configured();
    rig.paired.set(true);
    let boot = rig.boot();
    boot.controller.on_wifi_connected();

    boot.controller.on_button_event(ButtonEvent::LongPress);
    assert!(boot.controller.is_resetting());
    rig.journal.clear();

    boot.controller.on_power_write(true);
    boot.controller.on_button_event(ButtonEvent::SinglePress);
    boot.controller.on_button_event(ButtonEvent::DoublePress);
    boot.controller.on_pairing_removed();
    boot.controller.on_identify();
    boot.controller.on_wifi_connected();

    assert!(rig.journal.commands().is_empty());
    assert_eq!(rig.journal.events().len(), 6);
    assert!(rig
        .journal
        .events()
        .iter()
        .all(|e| matches!(e, AppEvent::Suppressed(_))));
    assert!(!boot.controller.power());
    assert_eq!(boot.controller.mode(), OperatingMode::Normal);
}
