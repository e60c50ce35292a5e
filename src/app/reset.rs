//! Factory-reset worker.
//!
//! A long press must not block the button task for the ~2.5 s the reset
//! takes, so the controller only posts a [`ResetRequest`] and returns. The
//! worker owns the receiving side and runs the sequence on its own task:
//!
//! ```text
//!   ButtonListener ──ResetRequest──▶ ResetChannel ──▶ ResetWorker
//!                                                     signal → 500 ms
//!                                                     erase WiFi → 1 s
//!                                                     erase pairings → 1 s
//!                                                     restart
//! ```
//!
//! The channel holds a single request; the controller refuses to queue a
//! second one, so two sequences never interleave.

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::delay::DelayNs;
use log::info;

use super::controller::ModeController;

/// Ask the worker to erase all configuration and restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetRequest;

pub type ResetChannel = Channel<CriticalSectionRawMutex, ResetRequest, 1>;

pub struct ResetWorker {
    controller: Arc<ModeController>,
    requests: Arc<ResetChannel>,
}

impl ResetWorker {
    pub(crate) fn new(controller: Arc<ModeController>, requests: Arc<ResetChannel>) -> Self {
        Self {
            controller,
            requests,
        }
    }

    /// Run a queued reset, if any, to completion. Returns whether one ran.
    pub fn run_pending(&self, delay: &mut impl DelayNs) -> bool {
        match self.requests.try_receive() {
            Ok(ResetRequest) => {
                self.controller.run_reset_sequence(delay);
                true
            }
            Err(_) => false,
        }
    }

    /// Worker task body: wait for requests forever.
    ///
    /// On hardware the first sequence ends in a restart, so this never
    /// loops twice.
    pub fn run(self, mut delay: impl DelayNs) -> ! {
        info!("Reset worker ready");
        loop {
            let ResetRequest = futures_lite::future::block_on(self.requests.receive());
            self.controller.run_reset_sequence(&mut delay);
        }
    }
}
