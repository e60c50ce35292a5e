//! Chip-level services: restart.

use log::info;

use crate::app::ports::SystemPort;

#[derive(Default)]
pub struct SystemAdapter {
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
}

impl SystemAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulation: restarts requested so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

impl SystemPort for SystemAdapter {
    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        info!("System: restarting");
        esp_idf_svc::hal::reset::restart();
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        self.restarts += 1;
        info!("System(sim): restart #{}", self.restarts);
    }
}
