//! Factory-reset sequence tests.
//!
//! The long press only queues the sequence; the worker runs it against a
//! recording delay so the step order and timing can be checked exactly.

use std::sync::Arc;

use outlet::app::controller::{RESET_ERASE_SETTLE_MS, RESET_SIGNAL_MS};
use outlet::app::events::{AppEvent, ResetStep, RestartReason};
use outlet::app::mode::PATTERN_RESETTING;
use outlet::app::ports::{ButtonEvent, ButtonListener, ConnectivityListener};

use crate::mock_hw::{Call, MockButton, Rig};

#[test]
fn long_press_only_queues_the_sequence() {
    let rig = Rig::configured();
    let boot = rig.boot();
    rig.journal.clear();

    boot.controller.on_button_event(ButtonEvent::LongPress);

    assert!(boot.controller.is_resetting());
    assert!(rig.journal.commands().is_empty());
    assert_eq!(rig.journal.events(), vec![AppEvent::ResetStarted]);
}

#[test]
fn worker_runs_steps_in_order_with_delays() {
    let rig = Rig::configured();
    let boot = rig.boot();
    boot.controller.on_button_event(ButtonEvent::LongPress);
    rig.journal.clear();

    assert!(boot.reset_worker.run_pending(&mut rig.delay()));

    assert_eq!(
        rig.journal.commands(),
        vec![
            Call::Signal(PATTERN_RESETTING),
            Call::Delay(RESET_SIGNAL_MS),
            Call::WifiReset,
            Call::Delay(RESET_ERASE_SETTLE_MS),
            Call::ServerReset,
            Call::Delay(RESET_ERASE_SETTLE_MS),
            Call::Restart,
        ]
    );
    assert_eq!(RESET_SIGNAL_MS, 500);
    assert_eq!(RESET_ERASE_SETTLE_MS, 1000);
    assert_eq!(
        rig.journal.events(),
        vec![
            AppEvent::ResetProgress(ResetStep::Signalled),
            AppEvent::ResetProgress(ResetStep::WifiErased),
            AppEvent::ResetProgress(ResetStep::PairingsErased),
            AppEvent::ResetProgress(ResetStep::Restarting),
            AppEvent::Restart(RestartReason::FactoryReset),
        ]
    );
}

#[test]
fn nothing_runs_without_a_request() {
    let rig = Rig::configured();
    let boot = rig.boot();
    rig.journal.clear();

    assert!(!boot.reset_worker.run_pending(&mut rig.delay()));
    assert!(rig.journal.calls().is_empty());
}

#[test]
fn erase_failures_do_not_stop_the_sequence() {
    let rig = Rig::configured();
    rig.wifi_reset_fails.set(true);
    rig.server_reset_fails.set(true);
    let boot = rig.boot();
    boot.controller.on_button_event(ButtonEvent::LongPress);

    boot.reset_worker.run_pending(&mut rig.delay());

    assert_eq!(rig.journal.count(&Call::WifiReset), 1);
    assert_eq!(rig.journal.count(&Call::ServerReset), 1);
    assert_eq!(rig.journal.count(&Call::Restart), 1);
}

#[test]
fn second_long_press_is_not_queued() {
    let rig = Rig::configured();
    let boot = rig.boot();

    boot.controller.on_button_event(ButtonEvent::LongPress);
    boot.controller.on_button_event(ButtonEvent::LongPress);

    let started = rig
        .journal
        .events()
        .iter()
        .filter(|e| **e == AppEvent::ResetStarted)
        .count();
    assert_eq!(started, 1);

    let mut delay = rig.delay();
    assert!(boot.reset_worker.run_pending(&mut delay));
    assert!(!boot.reset_worker.run_pending(&mut delay));
    assert_eq!(rig.journal.count(&Call::Restart), 1);
}

#[test]
fn reset_erases_stored_credentials_and_pairings() {
    let rig = Rig::configured();
    rig.paired.set(true);
    let boot = rig.boot();
    boot.controller.on_wifi_connected();

    boot.controller.on_button_event(ButtonEvent::LongPress);
    boot.reset_worker.run_pending(&mut rig.delay());

    assert!(rig.wifi_ssid.lock().unwrap().is_none());
    assert!(!rig.paired.get());
}

#[test]
fn long_press_through_registered_button_listener() {
    let rig = Rig::configured();
    let mut button = MockButton::default();
    let boot = rig
        .boot_with(&outlet::config::OutletConfig::default(), &mut button)
        .unwrap();

    let listener: Arc<dyn ButtonListener> = button.listener.expect("registered at boot");
    listener.on_button_event(ButtonEvent::LongPress);

    assert!(boot.controller.is_resetting());
    assert!(boot.reset_worker.run_pending(&mut rig.delay()));
}

#[test]
fn worker_thread_picks_up_request() {
    let rig = Rig::configured();
    let boot = rig.boot();
    let controller = boot.controller.clone();
    let worker = boot.reset_worker;
    let delay = rig.delay();

    std::thread::spawn(move || {
        worker.run(delay);
    });
    controller.on_button_event(ButtonEvent::LongPress);

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while rig.journal.count(&Call::Restart) == 0 {
        assert!(std::time::Instant::now() < deadline, "reset never ran");
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}
